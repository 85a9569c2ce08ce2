//! Error taxonomy shared by every layer.

/// Errors surfaced by registry, state tracker and command lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The caller supplied a value that fails validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store failures and anything else not caused by the caller.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable code, also used as the HTTP error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {e}"))
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variant() {
        assert_eq!(Error::invalid_input("x").code(), "BAD_REQUEST");
        assert_eq!(Error::not_found("x").code(), "NOT_FOUND");
        assert_eq!(Error::conflict("x").code(), "CONFLICT");
        assert_eq!(Error::internal("x").code(), "INTERNAL_ERROR");
    }

    #[test]
    fn display_includes_message() {
        let err = Error::not_found("device abc");
        assert_eq!(err.to_string(), "Not found: device abc");
    }
}
