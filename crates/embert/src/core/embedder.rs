use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use tokenizers::{EncodeInput, Tokenizer};

// Re-export
pub use candle_transformers::models::bert::BertModel;

use crate::core::config::model::EmbedderConfig;
use crate::core::repo::ModelWeightsPath;
use crate::core::utils::normalize_l2;
use crate::pooling::{pool_embeddings, PoolingStrategy};
use crate::{Result, Usage};

/// Trait seam for encoder models producing token-level hidden states.
pub trait EmbedderModel: Send + Sync {
    /// Forward pass mapping `[batch, seq_len]` token ids and their attention
    /// mask to `[batch, seq_len, hidden]` hidden states.
    fn encode(&self, token_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor>;

    fn device(&self) -> &Device;
}

impl EmbedderModel for BertModel {
    #[inline]
    fn encode(&self, token_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        // Single-segment inputs: token type ids are all zero.
        let token_type_ids = token_ids.zeros_like()?;
        Ok(self.forward(token_ids, &token_type_ids, Some(attention_mask))?)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

pub(crate) fn load_pretrained_model(
    model_weights: &ModelWeightsPath,
    config: &EmbedderConfig,
    device: &Device,
) -> Result<Box<dyn EmbedderModel>> {
    let vb = match model_weights {
        ModelWeightsPath::Pth(path) => VarBuilder::from_pth(path, DType::F32, device)?,
        ModelWeightsPath::Safetensors(path) => unsafe {
            VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)?
        },
    };

    match config {
        EmbedderConfig::Bert(cfg) => Ok(Box::new(BertModel::load(vb, cfg)?)),
    }
}

#[derive(Debug)]
pub struct EmbedOutput {
    pub embeddings: Tensor,
    pub usage: Usage,
}

/// Encodes a batch of sentences: tokenize, run the encoder, pool, and
/// optionally L2-normalize. Returns the embeddings along with token usage.
///
/// # Errors
///
/// Returns an error if there is any failure during the encoding process.
pub(crate) fn encode_batch_with_usage<'s, E>(
    model: &dyn EmbedderModel,
    tokenizer: &Tokenizer,
    sentences: Vec<E>,
    pooling: PoolingStrategy,
    normalize: bool,
) -> Result<EmbedOutput>
where
    E: Into<EncodeInput<'s>> + Send,
{
    let encodings = tokenizer.encode_batch_fast(sentences, true)?;

    // Padding tokens don't count towards usage.
    let prompt_tokens = encodings
        .iter()
        .map(|e| e.get_attention_mask().iter().sum::<u32>())
        .sum::<u32>();

    let device = model.device();

    let token_ids = encodings
        .iter()
        .map(|e| Tensor::new(e.get_ids(), device))
        .collect::<candle_core::Result<Vec<_>>>()?;
    let attention_masks = encodings
        .iter()
        .map(|e| Tensor::new(e.get_attention_mask(), device))
        .collect::<candle_core::Result<Vec<_>>>()?;

    let token_ids = Tensor::stack(&token_ids, 0)?;
    let attention_mask = Tensor::stack(&attention_masks, 0)?;

    tracing::trace!("running inference on batch {:?}", token_ids.shape());
    let hidden = model.encode(&token_ids, &attention_mask)?;

    let embeddings = pool_embeddings(&hidden, &attention_mask, pooling)?;
    let embeddings = if normalize {
        normalize_l2(&embeddings)?
    } else {
        embeddings
    };
    tracing::trace!("generated embeddings {:?}", embeddings.shape());

    let usage = Usage {
        prompt_tokens,
        total_tokens: prompt_tokens,
    };

    Ok(EmbedOutput { embeddings, usage })
}

/// Encodes a batch of sentences, discarding usage statistics.
pub(crate) fn encode_batch<'s, E>(
    model: &dyn EmbedderModel,
    tokenizer: &Tokenizer,
    sentences: Vec<E>,
    pooling: PoolingStrategy,
    normalize: bool,
) -> Result<Tensor>
where
    E: Into<EncodeInput<'s>> + Send,
{
    let output = encode_batch_with_usage(model, tokenizer, sentences, pooling, normalize)?;

    Ok(output.embeddings)
}
