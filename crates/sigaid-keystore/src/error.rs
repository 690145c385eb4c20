//! Error types for keyfile storage.

use thiserror::Error;

/// Keyfile failures.
///
/// `WrongPassword` and `Corrupt` are distinguishable only structurally:
/// a well-formed container that fails to open is a wrong password, a
/// malformed container is corrupt. The AEAD open itself is constant time
/// and opaque, so the split leaks nothing about the password.
#[derive(Debug, Error)]
pub enum KeyfileError {
    #[error("wrong password")]
    WrongPassword,

    #[error("corrupt keyfile: {0}")]
    Corrupt(String),

    #[error("invalid kdf parameters")]
    InvalidParams,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
