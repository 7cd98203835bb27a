//! Embedder configuration data.
//!
//! An embedder is defined by its model configuration (the `config.json` in the
//! root of a Hugging Face model repository) and the pooling strategy
//! (optionally defined in a `1_Pooling/config.json` file in the same
//! repository).

use candle_transformers::models::bert::Config as BertConfig;
use serde::Deserialize;

use crate::pooling::PoolingStrategy;

/// The base fields present in a `config.json` for an embedding model.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct BaseModelConfig {
    pub architectures: Option<Vec<String>>,
    pub model_type: String,
    pub hidden_size: usize,
    #[serde(alias = "n_positions")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub pad_token_id: u32,
}

/// Model-specific configuration, keyed by the `model_type` field.
#[derive(Deserialize)]
#[serde(tag = "model_type", rename_all = "kebab-case")]
pub(crate) enum EmbedderConfig {
    Bert(BertConfig),
}

/// Everything needed to instantiate a
/// [`SentenceTransformer`](crate::SentenceTransformer).
pub(crate) struct SentenceTransformerConfig {
    pub(crate) embedder_config: EmbedderConfig,
    pub(crate) pooling: PoolingStrategy,
    pub(crate) hidden_size: usize,
}
