//! Error types for cradle.
//!
//! [`Error`] is the fatal class: store I/O, serialization, configuration and
//! rasterizer failures. The registries return their own recoverable error
//! enums which wrap [`Error`] in a `Store` variant.

use std::path::PathBuf;
use thiserror::Error;

/// The fatal error type for cradle operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to read a collection file.
    #[error("failed to read collection {path}: {source}")]
    CollectionRead {
        /// Path to the collection file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a collection or blob file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A collection file exists but does not hold a JSON object.
    #[error("collection {path} is corrupt: {message}")]
    CorruptCollection {
        /// Path to the collection file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Payload Errors ===
    /// The rasterizer could not render an identification payload.
    #[error("failed to rasterize payload for child {child_id}: {message}")]
    Rasterize {
        /// ID of the child whose payload failed.
        child_id: String,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for cradle operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a rasterizer error for the given child.
    #[must_use]
    pub fn rasterize(child_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rasterize {
            child_id: child_id.into(),
            message: message.into(),
        }
    }
}

/// Broad recovery class of a registry error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or out-of-range input; the caller fixes the input.
    Validation,
    /// The record already exists.
    Conflict,
    /// Credentials were rejected.
    Auth,
    /// The requested record does not exist for this caller.
    NotFound,
    /// Storage failed; abort the action.
    Fatal,
}

/// Registration failures.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Password is too short or lacks a digit or a special character.
    #[error("password must be at least {min_length} characters and include numbers and special characters")]
    WeakPassword {
        /// Minimum accepted length.
        min_length: usize,
    },

    /// Email does not look like `local@domain.tld`.
    #[error("invalid email address: {email}")]
    InvalidEmail {
        /// The rejected email, normalized.
        email: String,
    },

    /// An account with this normalized email already exists.
    #[error("email already registered: {email}")]
    EmailTaken {
        /// The normalized email.
        email: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] Error),
}

impl RegistrationError {
    /// Recovery class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::WeakPassword { .. } | Self::InvalidEmail { .. } => ErrorClass::Validation,
            Self::EmailTaken { .. } => ErrorClass::Conflict,
            Self::Store(_) => ErrorClass::Fatal,
        }
    }

    /// Check if this error is unrecoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Authentication failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are not distinguished.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] Error),
}

impl AuthError {
    /// Recovery class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCredentials => ErrorClass::Auth,
            Self::Store(_) => ErrorClass::Fatal,
        }
    }

    /// Check if this error is unrecoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

/// Child registry failures.
#[derive(Error, Debug)]
pub enum ChildError {
    /// The child name is empty.
    #[error("child name is required")]
    MissingName,

    /// The age is outside the accepted range.
    #[error("age {age} is out of range (0-{max})")]
    AgeOutOfRange {
        /// The rejected age.
        age: u32,
        /// Maximum accepted age.
        max: u32,
    },

    /// No child with this ID is visible to the caller.
    #[error("child not found: {id}")]
    NotFound {
        /// The requested child ID.
        id: String,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] Error),
}

impl ChildError {
    /// Create a not-found error for the given ID.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Recovery class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingName | Self::AgeOutOfRange { .. } => ErrorClass::Validation,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Store(_) => ErrorClass::Fatal,
        }
    }

    /// Check if this error is unrecoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_rasterize_error_display() {
        let err = Error::rasterize("7", "too much data");
        let msg = err.to_string();
        assert!(msg.contains("child 7"));
        assert!(msg.contains("too much data"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_corrupt_collection_display() {
        let err = Error::CorruptCollection {
            path: PathBuf::from("/data/children.json"),
            message: "expected an object".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/children.json"));
        assert!(msg.contains("expected an object"));
    }

    #[test]
    fn test_file_write_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::FileWrite {
            path: PathBuf::from("/root/forbidden.json"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden.json"));
    }

    #[test]
    fn test_registration_error_classes() {
        assert_eq!(
            RegistrationError::WeakPassword { min_length: 6 }.class(),
            ErrorClass::Validation
        );
        assert_eq!(
            RegistrationError::EmailTaken {
                email: "a@x.com".to_string()
            }
            .class(),
            ErrorClass::Conflict
        );
        assert!(RegistrationError::from(Error::internal("disk")).is_fatal());
    }

    #[test]
    fn test_auth_error_is_uninformative() {
        let err = AuthError::InvalidCredentials;
        assert_eq!(err.to_string(), "invalid email or password");
        assert_eq!(err.class(), ErrorClass::Auth);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_child_error_classes() {
        assert_eq!(ChildError::MissingName.class(), ErrorClass::Validation);
        assert_eq!(
            ChildError::AgeOutOfRange { age: 40, max: 25 }.class(),
            ErrorClass::Validation
        );
        assert_eq!(ChildError::not_found("3").class(), ErrorClass::NotFound);
        assert!(ChildError::from(Error::internal("disk")).is_fatal());
    }

    #[test]
    fn test_child_error_display() {
        assert_eq!(ChildError::not_found("3").to_string(), "child not found: 3");
        assert_eq!(
            ChildError::AgeOutOfRange { age: 40, max: 25 }.to_string(),
            "age 40 is out of range (0-25)"
        );
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err = ChildError::from(Error::internal("disk full"));
        assert_eq!(err.to_string(), "internal error: disk full");
    }
}
