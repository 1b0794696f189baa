use thiserror::Error;

/// All errors produced by cybella-core.
#[derive(Debug, Error)]
pub enum CybellaError {
    #[error("audio signal is empty")]
    EmptySignal,

    #[error("audio signal contains a non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    #[error("sample rate mismatch: pipeline expects {expected} Hz, got {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("invalid embedding for window {window}: {reason}")]
    InvalidEmbedding { window: usize, reason: String },

    #[error("invalid probability distribution for window {window}: {reason}")]
    InvalidDistribution { window: usize, reason: String },

    #[error("cannot aggregate an empty sequence of distributions")]
    EmptyAggregation,

    #[error("embedding model error: {0}")]
    Embedding(String),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("audio decode error: {0}")]
    AudioDecode(String),

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CybellaError>;
