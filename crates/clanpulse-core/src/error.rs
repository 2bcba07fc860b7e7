//! Error types for clanpulse operations.
//!
//! Provides a structured error hierarchy with error codes for programmatic
//! handling. Failures local to one group are non-fatal and carry enough
//! context for the caller to log and move on.

use thiserror::Error;

/// Result type alias for clanpulse operations.
pub type ClanPulseResult<T> = Result<T, ClanPulseError>;

/// Main error type for all clanpulse operations.
#[derive(Error, Debug)]
pub enum ClanPulseError {
    /// Referenced group does not exist.
    #[error("Group not found: {id}")]
    NotFound { id: String },

    /// Duplicate registration attempt.
    #[error("Group already registered: {id}")]
    AlreadyExists { id: String },

    /// History query failed or timed out.
    #[error("Fetch error: {message}")]
    Fetch {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Durable write or read against the registry failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Outbound delivery or other network operation failed.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Group (GRP_xxx)
    GrpNotFound,
    GrpDuplicate,

    // Fetch (FETCH_xxx)
    FetchFailed,
    FetchTimeout,
    FetchChannelUnreachable,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,
    NetDeliveryFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::GrpNotFound => "GRP_001",
            ErrorCode::GrpDuplicate => "GRP_002",
            ErrorCode::FetchFailed => "FETCH_001",
            ErrorCode::FetchTimeout => "FETCH_002",
            ErrorCode::FetchChannelUnreachable => "FETCH_003",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::NetDeliveryFailed => "NET_003",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl ClanPulseError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an already exists error.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Create a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            code: ErrorCode::FetchFailed,
            source: None,
        }
    }

    /// Create a fetch timeout error.
    pub fn fetch_timeout(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            code: ErrorCode::FetchTimeout,
            source: None,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetConnectionFailed,
            source: None,
        }
    }

    /// Create a delivery error.
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            code: ErrorCode::NetDeliveryFailed,
            source: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::GrpNotFound,
            Self::AlreadyExists { .. } => ErrorCode::GrpDuplicate,
            Self::Fetch { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Network { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error should skip the current group's cycle but leave
    /// the rest of the cycle running.
    pub fn is_group_local(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::Fetch { .. }
                | Self::Database { .. }
                | Self::Network { .. }
        )
    }
}

impl From<rusqlite::Error> for ClanPulseError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}
