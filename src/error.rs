use thiserror::Error;

#[derive(Error, Debug)]
pub enum VmgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected {expected} at byte {pos}")]
    Structural { expected: String, pos: usize },

    #[error("unrecognized content in envelope at byte {pos}: {line:?}")]
    UnexpectedContent { line: String, pos: usize },

    #[error("no blank line between headers and body before byte {pos}")]
    MalformedBody { pos: usize },

    #[error("missing or unparseable {0} header in message body")]
    MissingHeader(String),

    #[error("internal error at byte {pos}")]
    Internal { pos: usize },
}

pub type Result<T> = std::result::Result<T, VmgError>;
