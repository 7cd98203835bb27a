#![doc = include_str!("../README.md")]

pub mod core;
mod error;
pub mod export;
pub mod pooling;

pub use candle_core::Device;
pub use crate::core::repo::ModelRepo;
pub use crate::core::sentence_transformer::SentenceTransformer;
pub use error::{Error, Result};
pub use pooling::PoolingStrategy;

use serde::Serialize;

/// Token accounting for a single encoding request.
#[derive(Debug, Serialize, PartialEq, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}
