use candle_core::{IndexOp, Tensor};
use std::path::Path;
use tokenizers::tokenizer::Tokenizer;
use tokenizers::{EncodeInput, Encoding, PaddingParams, PaddingStrategy};

use crate::core::config::parse::parse_config;
use crate::core::device::DEVICE;
use crate::core::embedder::{
    encode_batch, encode_batch_with_usage, load_pretrained_model, EmbedOutput, EmbedderModel,
};
use crate::core::repo::ModelRepo;
use crate::pooling::PoolingStrategy;
use crate::Result;

/// The main abstraction for generating text embeddings with a pre-trained
/// model.
///
/// Loading is the expensive step: construct one instance and reuse it across
/// `encode*` calls.
///
/// ## Example
///
/// ```rust,no_run
/// # use embert::SentenceTransformer;
/// # fn main() -> embert::Result<()> {
/// let encoder = SentenceTransformer::from_repo_string("sentence-transformers/all-MiniLM-L6-v2")?;
///
/// let sentences = vec!["Hello, how are you?", "Hey, how are you doing?"];
/// let embeddings = encoder.encode_batch(sentences, true)?;
/// # Ok(())
/// # }
/// ```
pub struct SentenceTransformer {
    model: Box<dyn EmbedderModel>,
    tokenizer: Tokenizer,
    pooling: PoolingStrategy,
    hidden_size: usize,
}

impl SentenceTransformer {
    /// Load a model from the Hugging Face Hub, addressed as `repo[:revision]`.
    pub fn from_repo_string(repo_string: &str) -> Result<Self> {
        Self::from_model_repo(&ModelRepo::from_repo_string(repo_string)?, None)
    }

    /// Load a model from a folder containing the weights, config, and
    /// tokenizer json files. Often, these folders are created by huggingface
    /// libraries when pulling a model from the hub, and are saved in the
    /// `~/.cache/huggingface/hub/models` directory.
    pub fn from_folder<P: AsRef<Path>>(folder: P) -> Result<Self> {
        Self::from_model_repo(&ModelRepo::from_path(folder), None)
    }

    pub fn from_model_repo(
        repo: &ModelRepo,
        pooling_override: Option<PoolingStrategy>,
    ) -> Result<Self> {
        let span = tracing::span!(tracing::Level::TRACE, "st-load");
        let _enter = span.enter();

        let files = repo.file_paths()?;
        let config = parse_config(&files, pooling_override)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer_config)?;

        // Batch-longest padding so a whole batch shares one shape.
        if let Some(pp) = tokenizer.get_padding_mut() {
            pp.strategy = PaddingStrategy::BatchLongest;
        } else {
            tokenizer.with_padding(Some(PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                ..Default::default()
            }));
        }

        let model = load_pretrained_model(&files.model_weights, &config.embedder_config, &DEVICE)?;

        Ok(Self {
            model,
            tokenizer,
            pooling: config.pooling,
            hidden_size: config.hidden_size,
        })
    }

    /// Embedding dimensionality of the loaded model.
    pub fn embedding_dim(&self) -> usize {
        self.hidden_size
    }

    pub fn tokenize<'s, E>(&self, sentences: Vec<E>) -> Result<Vec<Encoding>>
    where
        E: Into<EncodeInput<'s>> + Send,
    {
        Ok(self.tokenizer.encode_batch_fast(sentences, true)?)
    }

    pub fn encode_batch_with_usage<'s, E>(
        &self,
        sentences: Vec<E>,
        normalize: bool,
    ) -> Result<EmbedOutput>
    where
        E: Into<EncodeInput<'s>> + Send,
    {
        let span = tracing::span!(tracing::Level::TRACE, "st-encode-batch");
        let _enter = span.enter();

        encode_batch_with_usage(
            self.model.as_ref(),
            &self.tokenizer,
            sentences,
            self.pooling,
            normalize,
        )
    }

    pub fn encode_batch<'s, E>(&self, sentences: Vec<E>, normalize: bool) -> Result<Tensor>
    where
        E: Into<EncodeInput<'s>> + Send,
    {
        let span = tracing::span!(tracing::Level::TRACE, "st-encode-batch");
        let _enter = span.enter();

        encode_batch(
            self.model.as_ref(),
            &self.tokenizer,
            sentences,
            self.pooling,
            normalize,
        )
    }

    /// Encode a single sentence into a plain vector.
    pub fn encode(&self, sentence: &str, normalize: bool) -> Result<Vec<f32>> {
        let embeddings = self.encode_batch(vec![sentence], normalize)?;
        Ok(embeddings.i(0)?.to_vec1()?)
    }

    pub(crate) fn model(&self) -> &dyn EmbedderModel {
        self.model.as_ref()
    }

    pub(crate) fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}
