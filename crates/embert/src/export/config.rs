use serde::Deserialize;

use crate::{Error, Result};

fn default_layer_norm_eps() -> f64 {
    1e-12
}

fn default_hidden_act() -> String {
    "gelu".to_string()
}

/// Architecture hyperparameters read from `config.json`, as needed to lay out
/// the exported graph.
#[derive(Debug, Clone, Deserialize)]
pub struct BertOnnxConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub max_position_embeddings: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: String,
}

impl BertOnnxConfig {
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(Error::Export(format!(
                "hidden size {} is not divisible into {} attention heads",
                self.hidden_size, self.num_attention_heads
            )));
        }

        // The graph emits the exact erf formulation; tanh-approximated
        // checkpoints would silently diverge.
        if self.hidden_act != "gelu" {
            return Err(Error::Export(format!(
                "unsupported activation `{}`: only exact gelu can be exported",
                self.hidden_act
            )));
        }

        Ok(())
    }
}
