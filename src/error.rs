//! Unified error handling for slirc-bot.
//!
//! Each concern gets its own error enum with a static `error_code()` label
//! used as a structured logging field. `anyhow` only appears in `main`.

use thiserror::Error;

// ============================================================================
// Extension Errors (loading and dispatch)
// ============================================================================

/// An extension was rejected while being loaded or registered.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid extension id: {0:?}")]
    InvalidId(String),

    #[error("extension {0} is already loaded")]
    DuplicateId(String),

    #[error("extension {0} is blacklisted")]
    Blacklisted(String),

    #[error("failed to construct extension {id}: {reason}")]
    Construct { id: String, reason: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LoadError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "invalid_id",
            Self::DuplicateId(_) => "duplicate_id",
            Self::Blacklisted(_) => "blacklisted",
            Self::Construct { .. } => "construct_failed",
            Self::Store(_) => "store_error",
        }
    }
}

/// A hook or command handler failed during dispatch.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HookError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Failed(_) => "hook_failed",
            Self::Store(_) => "store_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Result type for extension hooks.
pub type HookResult = Result<(), HookError>;

/// Result type for hooks and commands that may produce reply text.
pub type ReplyResult = Result<Option<String>, HookError>;

// ============================================================================
// Store Errors (extension-owned persistence)
// ============================================================================

/// Errors from an extension's persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "store_open",
            Self::Database(_) => "store_database",
            Self::Serialization(_) => "store_serialization",
            Self::Io(_) => "store_io",
        }
    }
}

// ============================================================================
// Protocol and Connection Errors
// ============================================================================

/// A raw protocol line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("missing command in line: {0}")]
    MissingCommand(String),
}

/// Errors that end a single server connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("connection closed by server")]
    Closed,

    #[error("server error: {0}")]
    Server(String),

    #[error("registration timed out")]
    RegistrationTimeout,
}

impl ConnectionError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Codec(_) => "codec_error",
            Self::Tls(_) => "tls_error",
            Self::Closed => "closed",
            Self::Server(_) => "server_error",
            Self::RegistrationTimeout => "registration_timeout",
        }
    }
}
