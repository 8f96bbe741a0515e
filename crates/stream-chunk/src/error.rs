#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("frame is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("frame header is incomplete: expected 4 `|`-separated fields, got {0}")]
    MissingFields(usize),
    #[error("message id is empty")]
    EmptyMessageId,
    #[error("invalid part index: {0:?}")]
    InvalidPartIndex(String),
    #[error("invalid part total: {0:?}")]
    InvalidPartTotal(String),
    #[error("part index {index} is outside part total {total}")]
    PartOutOfRange { index: usize, total: usize },
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}
