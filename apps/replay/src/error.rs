#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("fixture line {line}: {source}")]
    Fixture {
        line: usize,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Transcript(#[from] hypr_transcript::Error),
}
