use std::fs;
use std::path::PathBuf;

use crate::core::config::model::{BaseModelConfig, EmbedderConfig, SentenceTransformerConfig};
use crate::core::repo::ModelRepoFiles;
use crate::pooling::{PoolConfig, PoolingStrategy};
use crate::{Error, Result};

/// Parse the model configuration from the resolved repository files.
pub(crate) fn parse_config(
    files: &ModelRepoFiles,
    // If not given, it is resolved from the repository's pooling configuration.
    pooling_override: Option<PoolingStrategy>,
) -> Result<SentenceTransformerConfig> {
    let config_str = fs::read_to_string(&files.config)?;
    let base: BaseModelConfig = serde_json::from_str(&config_str)?;

    if let Some(architectures) = &base.architectures {
        if !architectures.iter().any(|a| a.starts_with("Bert")) {
            return Err(Error::InvalidModelConfig(
                "only BERT-family encoders are supported",
            ));
        }
    }

    let embedder_config: EmbedderConfig = serde_json::from_str(&config_str)?;
    let pooling = resolve_pooling(files.pooling_config.clone(), pooling_override)?;

    Ok(SentenceTransformerConfig {
        embedder_config,
        pooling,
        hidden_size: base.hidden_size,
    })
}

/// Pick the pooling strategy: an explicit override wins, then the
/// repository's `1_Pooling/config.json`.
pub(crate) fn resolve_pooling(
    pooling_config_path: Option<PathBuf>,
    pooling: Option<PoolingStrategy>,
) -> Result<PoolingStrategy> {
    match (pooling, pooling_config_path) {
        (Some(strategy), _) => Ok(strategy),
        (None, Some(path)) => {
            let config: PoolConfig = serde_json::from_str(&fs::read_to_string(path)?)?;

            if config.pooling_mode_cls_token {
                Ok(PoolingStrategy::Cls)
            } else if config.pooling_mode_mean_tokens {
                Ok(PoolingStrategy::Mean)
            } else {
                Err(Error::NoPoolingConfiguration(
                    "unsupported pooling mode in 1_Pooling/config.json",
                ))
            }
        }
        (None, None) => Err(Error::NoPoolingConfiguration(
            "no pooling configuration provided or found in model repository",
        )),
    }
}
