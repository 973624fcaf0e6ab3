use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No posts found for keyword '{keyword}'")]
    EmptyInput { keyword: String },

    #[error("Invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("AI backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run cancelled before completion")]
    Cancelled,
}

impl CoreError {
    pub fn invariant(message: impl Into<String>) -> Self {
        CoreError::InvariantViolation {
            message: message.into(),
        }
    }
}

/// Failures of a single `AiBackend::complete` call. These never leave the
/// image selector or the text generator; they only decide which path runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Backend timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Backend error: {message}")]
    Error { message: String },
}

impl BackendError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        BackendError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        BackendError::Error {
            message: message.into(),
        }
    }

    /// Maps an HTTP status to the taxonomy: 429 and 5xx are transient.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 | 500..=599 => BackendError::Unavailable {
                reason: format!("HTTP {status}: {body}"),
            },
            _ => BackendError::Error {
                message: format!("HTTP {status}: {body}"),
            },
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            // includes connect timeouts
            BackendError::Unavailable {
                reason: error.to_string(),
            }
        } else if error.is_timeout() {
            // reqwest does not expose the configured duration
            BackendError::Timeout { seconds: 0 }
        } else if error.is_request() {
            BackendError::Unavailable {
                reason: error.to_string(),
            }
        } else if error.is_decode() {
            BackendError::Error {
                message: format!("Unexpected response shape: {error}"),
            }
        } else {
            BackendError::Error {
                message: error.to_string(),
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Corrupt row for post {post_id}: {details}")]
    CorruptRow { post_id: String, details: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[source] sqlx::Error),
}

impl DatabaseError {
    /// Classifies a driver error, singling out SQLite's busy and locked codes.
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            // extended result codes keep the primary code in the low byte
            let primary = db
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| code & 0xff);
            if matches!(primary, Some(5) | Some(6)) || db.message().contains("database is locked")
            {
                return DatabaseError::DatabaseLocked;
            }
        }
        DatabaseError::Sql(error)
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        Self::from_sqlx(error)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
