//! Serialization of a pretrained sentence-transformer into a portable ONNX
//! artifact.
//!
//! The artifact carries the full computation (token/position embeddings, the
//! transformer stack, masked mean pooling, L2 normalization) as an opset 14
//! graph with two inputs (`input_ids`, `attention_mask`) and a single output
//! (`sentence_embedding`). Batch and sequence axes stay symbolic, so the same
//! file serves any batch size and any sequence length up to the model
//! maximum.

mod config;
mod graph;
mod weights;

#[cfg(test)]
pub(crate) mod test_fixtures;

use std::path::{Path, PathBuf};

use candle_core::Tensor;
use prost::Message;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams};

use crate::core::config::parse::resolve_pooling;
use crate::core::device::DEVICE;
use crate::core::repo::ModelRepo;
use crate::core::utils::normalize_l2;
use crate::pooling::{self, PoolingStrategy};
use crate::{Error, Result, SentenceTransformer};

pub use config::BertOnnxConfig;
pub use graph::{
    build_model, ATTENTION_MASK, BATCH_DIM, INPUT_IDS, OPSET_VERSION, SENTENCE_EMBEDDING,
    SEQUENCE_DIM,
};
pub use weights::WeightMap;

/// Sentence used to smoke-test the model before serialization.
pub const DUMMY_INPUT: &str = "This is a dummy input";
/// Length the dummy sentence is padded/truncated to.
pub const DUMMY_SEQ_LEN: usize = 128;

/// Summary of a finished export.
#[derive(Debug)]
pub struct ExportReport {
    pub path: PathBuf,
    pub nodes: usize,
    pub initializers: usize,
    pub bytes: usize,
}

/// Export the model in `repo` to a self-contained ONNX file at `output`.
///
/// The checkpoint is verified by running the fixed dummy sentence through the
/// candle forward pass before anything is written to disk. Exports are
/// deterministic: the same checkpoint produces byte-identical artifacts.
pub fn export_onnx(repo: &ModelRepo, output: &Path) -> Result<ExportReport> {
    let span = tracing::span!(tracing::Level::DEBUG, "onnx-export");
    let _enter = span.enter();

    let files = repo.file_paths()?;

    let config_str = std::fs::read_to_string(&files.config)?;
    let config: BertOnnxConfig = serde_json::from_str(&config_str)?;
    config.validate()?;

    // The graph bakes in mean pooling; refuse checkpoints configured otherwise.
    let pooling = resolve_pooling(files.pooling_config.clone(), None)?;
    if pooling != PoolingStrategy::Mean {
        return Err(Error::Export(
            "the exported graph applies mean pooling, but the checkpoint is configured for CLS pooling".to_string(),
        ));
    }

    let weights_path = files.model_weights.safetensors()?;
    let tensors = candle_core::safetensors::load(weights_path, &DEVICE)?;
    let weights = WeightMap::new(tensors);

    verify_dummy_forward(repo, &config)?;

    let model = build_model(&config, &weights)?;
    let (nodes, initializers) = model
        .graph
        .as_ref()
        .map(|g| (g.node.len(), g.initializer.len()))
        .unwrap_or_default();

    let buf = model.encode_to_vec();
    std::fs::write(output, &buf)?;
    tracing::info!(path = %output.display(), bytes = buf.len(), "wrote ONNX artifact");

    Ok(ExportReport {
        path: output.to_owned(),
        nodes,
        initializers,
        bytes: buf.len(),
    })
}

/// Run the fixed dummy sentence through the candle forward pass and check the
/// resulting embedding before committing anything to disk.
///
/// This is the example-input step of the export: the same pipeline the graph
/// encodes symbolically is executed once on a concrete shape.
fn verify_dummy_forward(repo: &ModelRepo, config: &BertOnnxConfig) -> Result<()> {
    let encoder = SentenceTransformer::from_model_repo(repo, None)?;

    let mut tokenizer = encoder.tokenizer().clone();
    let max_length = DUMMY_SEQ_LEN.min(config.max_position_embeddings);
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_length),
        ..Default::default()
    }));
    tokenizer.with_truncation(Some(TruncationParams {
        max_length,
        ..Default::default()
    }))?;

    let encoding = tokenizer.encode(DUMMY_INPUT, true)?;
    let device = encoder.model().device();
    let token_ids = Tensor::new(encoding.get_ids(), device)?.unsqueeze(0)?;
    let attention_mask = Tensor::new(encoding.get_attention_mask(), device)?.unsqueeze(0)?;

    let hidden = encoder.model().encode(&token_ids, &attention_mask)?;
    let pooled = pooling::mean_pooling(&hidden, &attention_mask)?;
    let embedding = normalize_l2(&pooled)?;

    let (batch, dim) = embedding.dims2()?;
    if batch != 1 || dim != config.hidden_size {
        return Err(Error::Export(format!(
            "dummy input produced an embedding of shape [{batch}, {dim}], expected [1, {}]",
            config.hidden_size
        )));
    }

    let values = embedding.flatten_all()?.to_vec1::<f32>()?;
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::Export(
            "dummy input produced a non-finite embedding".to_string(),
        ));
    }

    tracing::debug!("dummy forward pass verified ({dim} dims over {max_length} tokens)");
    Ok(())
}
