#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Chunk(#[from] hypr_stream_chunk::Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] envy::Error),
    #[error("audio metadata too short: {0} bytes, need 8")]
    InvalidAudioMetadata(usize),
}
