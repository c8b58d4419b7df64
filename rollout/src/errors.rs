use common_redis::CustomRedisError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode feature record: {0}")]
    Encode(String),
    #[error("failed to decode feature record: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum RolloutError {
    #[error(transparent)]
    Redis(#[from] CustomRedisError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("malformed value for {key}: {detail}")]
    MalformedEntry { key: String, detail: String },
    #[error("redis returned {received} values for {requested} keys")]
    BatchLengthMismatch { requested: usize, received: usize },
    #[error("rollout percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(u8),
    #[error("invalid feature name {0:?}: must be non-empty and contain no ':'")]
    InvalidFeatureName(String),
}
