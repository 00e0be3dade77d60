use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UrftError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("handshake failed after {0} attempts")]
    HandshakeFailed(u32),

    #[error("could not open output file: {0}")]
    OutputOpenFailed(#[source] io::Error),

    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    #[error("invalid basename in filename handshake")]
    InvalidBasename,
}

impl From<io::Error> for UrftError {
    fn from(err: io::Error) -> Self {
        UrftError::Socket(err)
    }
}
