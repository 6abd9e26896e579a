//! Error types for envault.
//!
//! Every variant is a distinct failure mode of the vault. Messages are
//! intentionally minimal: they signal *what* failed without echoing key
//! material or payload bytes.
//!
//! Layers add operation context with [`ResultExt::context`] instead of
//! swallowing the underlying error. [`VaultError::kind`] looks through any
//! number of context layers, so callers can still branch on the root cause.

/// The single error type for all envault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No active key exists, or no key (active or retired) has the given id.
    #[error("key not found")]
    KeyNotFound,

    /// The secret does not exist or is not owned by the requesting user.
    #[error("secret not found")]
    SecretNotFound,

    /// A cryptographic key was not 16 or 32 bytes long.
    #[error("invalid key")]
    InvalidKey,

    /// The AEAD seal operation failed.
    #[error("encryption failed")]
    EncryptionFailure,

    /// Authentication tag mismatch, truncated or malformed ciphertext.
    #[error("decryption failed")]
    DecryptionFailure,

    /// The system's random number generator failed to produce bytes.
    #[error("randomness source failed")]
    RandomnessFailure,

    /// Configuration was missing or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The storage backend failed (I/O, transaction, decoding of a row).
    #[error("repository failure: {0}")]
    Repository(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An error annotated with the operation that produced it.
    #[error("{op}: {source}")]
    Context {
        op: &'static str,
        #[source]
        source: Box<VaultError>,
    },
}

/// The root cause of a [`VaultError`], stripped of context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    KeyNotFound,
    SecretNotFound,
    InvalidKey,
    EncryptionFailure,
    DecryptionFailure,
    RandomnessFailure,
    InvalidConfig,
    Repository,
}

impl VaultError {
    /// Build a repository failure from any error or message.
    pub fn repository(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Repository(err.into())
    }

    /// Classify this error, looking through every context layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyNotFound => ErrorKind::KeyNotFound,
            Self::SecretNotFound => ErrorKind::SecretNotFound,
            Self::InvalidKey => ErrorKind::InvalidKey,
            Self::EncryptionFailure => ErrorKind::EncryptionFailure,
            Self::DecryptionFailure => ErrorKind::DecryptionFailure,
            Self::RandomnessFailure => ErrorKind::RandomnessFailure,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Repository(_) => ErrorKind::Repository,
            Self::Context { source, .. } => source.kind(),
        }
    }
}

impl From<sqlx::Error> for VaultError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(Box::new(err))
    }
}

impl From<sqlx::migrate::MigrateError> for VaultError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Repository(Box::new(err))
    }
}

/// Shorthand used across the crate.
pub type Result<T, E = VaultError> = std::result::Result<T, E>;

/// Adds operation context to a fallible vault call.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with the name of the failing operation.
    fn context(self, op: &'static str) -> Result<T>;
}

impl<T, E: Into<VaultError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, op: &'static str) -> Result<T> {
        self.map_err(|err| VaultError::Context {
            op,
            source: Box::new(err.into()),
        })
    }
}
