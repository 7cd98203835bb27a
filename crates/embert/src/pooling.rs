use candle_core::{DType, IndexOp, Tensor};
use serde::Deserialize;

use crate::Result;

/// Pooling applied to the encoder's last hidden state to obtain one vector
/// per sentence.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PoolingStrategy {
    /// Select the CLS token as embedding
    Cls,
    /// Mean over non-padding tokens, weighted by the attention mask
    Mean,
}

/// Layout of a sentence-transformers `1_Pooling/config.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolConfig {
    pub(crate) pooling_mode_cls_token: bool,
    pub(crate) pooling_mode_mean_tokens: bool,
    #[serde(default)]
    pooling_mode_max_tokens: bool,
    #[serde(default)]
    pooling_mode_mean_sqrt_len_tokens: bool,
}

pub(crate) fn pool_embeddings(
    hidden: &Tensor,
    attention_mask: &Tensor,
    strategy: PoolingStrategy,
) -> Result<Tensor> {
    match strategy {
        PoolingStrategy::Cls => Ok(hidden.i((.., 0))?),
        PoolingStrategy::Mean => mean_pooling(hidden, attention_mask),
    }
}

/// Attention-mask-aware mean pooling.
///
/// `hidden` is `[batch, seq_len, hidden]`, `attention_mask` is `[batch, seq_len]`
/// with 1 for real tokens and 0 for padding. Padding positions are excluded
/// from both the sum and the divisor.
pub(crate) fn mean_pooling(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;

    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

    Ok(summed.broadcast_div(&counts)?)
}
