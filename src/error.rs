//! Error types for the laptop catalog service.

use tonic::Status;

/// Main error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A record with the same key is already stored.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A caller-supplied value is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A token could not be issued or did not verify.
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Hashing or parsing a password hash failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Reading or writing image payloads failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Any other failure inside a store.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<argon2::password_hash::Error> for Error {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::PasswordHash(err.to_string())
    }
}

/// Status returned by a handler for a failure inside the service.
///
/// Token errors reaching a handler come from issuing a token and are
/// internal; rejected tokens never get this far.
impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::AlreadyExists(_) => Status::already_exists(err.to_string()),
            Error::NotFound(_) => Status::not_found(err.to_string()),
            Error::InvalidArgument(_) => Status::invalid_argument(err.to_string()),
            Error::Token(_)
            | Error::PasswordHash(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Internal(_) => Status::internal(err.to_string()),
        }
    }
}

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
