use crate::error::*;
use std::fmt;
use tracing::{error, info, warn};

pub trait ErrorExt: fmt::Display {
    fn is_retryable(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl CoreError {
    pub fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::Backend(e) => {
                error!("Backend error details: {:?}", e);
            }
            CoreError::Database(e) => {
                error!("Database error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }
}

impl ErrorExt for CoreError {
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::Backend(e) => e.is_retryable(),
            CoreError::Database(e) => e.is_retryable(),
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::EmptyInput { keyword } => format!(
                "No posts were found for '{}'. Crawl the keyword first, then try again.",
                keyword
            ),
            CoreError::InvariantViolation { .. } => {
                "An internal consistency check failed. This is a bug, please report it."
                    .to_string()
            }
            CoreError::Backend(e) => e.user_friendly_message(),
            CoreError::Database(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Io(e) => format!("File access failed: {}", e),
            CoreError::Serialization(_) => {
                "Could not read or write JSON data. Please check the file format.".to_string()
            }
            CoreError::Cancelled => {
                "Interrupted before the review was finished. Nothing was saved.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::EmptyInput { .. } => "EMPTY_INPUT".to_string(),
            CoreError::InvariantViolation { .. } => "INVARIANT_VIOLATION".to_string(),
            CoreError::Backend(e) => e.error_code(),
            CoreError::Database(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Cancelled => "CANCELLED".to_string(),
        }
    }
}

impl ErrorExt for BackendError {
    fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Unavailable { .. })
    }

    fn user_friendly_message(&self) -> String {
        match self {
            BackendError::Unavailable { .. } => "The AI service could not be reached.".to_string(),
            BackendError::Timeout { .. } => "The AI service took too long to answer.".to_string(),
            BackendError::Error { .. } => "The AI service returned an unusable answer.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            BackendError::Unavailable { .. } => "BACKEND_UNAVAILABLE".to_string(),
            BackendError::Timeout { .. } => "BACKEND_TIMEOUT".to_string(),
            BackendError::Error { .. } => "BACKEND_ERROR".to_string(),
        }
    }
}

impl ErrorExt for DatabaseError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatabaseError::DatabaseLocked | DatabaseError::ConnectionFailed { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => {
                "Database connection failed. Please check the database URL.".to_string()
            }
            DatabaseError::DatabaseLocked => {
                "Database is temporarily busy. Please try again.".to_string()
            }
            DatabaseError::CorruptRow { post_id, .. } => {
                format!("Stored post '{}' could not be decoded.", post_id)
            }
            _ => "Database error occurred. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            DatabaseError::ConnectionFailed { .. } => "DB_CONNECTION_FAILED".to_string(),
            DatabaseError::MigrationFailed { .. } => "DB_MIGRATION_FAILED".to_string(),
            DatabaseError::QueryFailed { .. } => "DB_QUERY_FAILED".to_string(),
            DatabaseError::CorruptRow { .. } => "DB_CORRUPT_ROW".to_string(),
            DatabaseError::DatabaseLocked => "DB_LOCKED".to_string(),
            DatabaseError::Sql(_) => "DB_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::InvalidValue { field, value } => {
                format!("Invalid value '{}' for configuration field '{}'.", value, field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs errors on behalf of one component, so every line names where it came from.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReporter {
    component: &'static str,
}

impl ErrorReporter {
    pub const fn new(component: &'static str) -> Self {
        Self { component }
    }

    /// A fatal error: logged with its details, code and user-facing message.
    pub fn report_error(&self, error: &CoreError) {
        error!("{} failed", self.component);
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
    }

    /// A recovered error: one warning naming the component, the cause and
    /// what happens instead.
    pub fn report_warning<E: ErrorExt>(&self, error: &E, fallback: &str) {
        warn!(
            code = %error.error_code(),
            "{}: {} ({}), {}",
            self.component,
            error,
            error.user_friendly_message(),
            fallback
        );
    }
}
