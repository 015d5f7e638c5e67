use std::io;

use thiserror::Error;

/// Errors surfaced by every sealpad operation.
#[derive(Error, Debug)]
pub enum SealError {
    /// A settings value is out of range, or the append scratch directory
    /// would collide with the target file's directory.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The password is empty.
    #[error("password must not be empty")]
    InvalidPassword,

    /// The input ended before the salt and IV could be read.
    #[error("truncated header: expected {expected} bytes, found {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    /// Cipher or decompression failure while reading a container.
    ///
    /// There is no integrity tag, so a wrong password may also show up as
    /// garbage output instead of this error.
    #[error("Invalid password or corrupted data: {0}")]
    DecryptionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SealError>;

impl SealError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SealError::InvalidConfiguration(msg.into())
    }

    /// Sorts an `io::Error` raised while pulling plaintext out of the
    /// decrypt pipeline. Cipher and inflate layers report through
    /// `InvalidData`/`InvalidInput`/`UnexpectedEof`; everything else came
    /// from the underlying source.
    pub(crate) fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => SealError::DecryptionFailed(err.to_string()),
            _ => SealError::Io(err),
        }
    }
}
