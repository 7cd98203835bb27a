use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid model repository: {0}")]
    InvalidModelRepo(String),

    #[error("Model load error: {0}")]
    ModelLoad(&'static str),

    #[error("Invalid model architecture: {0}")]
    InvalidModelConfig(&'static str),

    #[error("No pooling configuration: {0}")]
    NoPoolingConfiguration(&'static str),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenization error: {0}")]
    Tokenization(#[from] tokenizers::Error),

    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("HF Hub error: {0}")]
    HFHub(#[from] hf_hub::api::sync::ApiError),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
