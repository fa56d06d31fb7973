//! Error handling for the access control core.
//!
//! Every fallible operation returns [`AccessError`]. An error carries:
//! - a stable [`ErrorCode`] for programmatic handling and metrics
//! - the coarse [`ErrorKind`] callers branch on (validation, conflict, ...)
//! - a user-facing message, plus an optional internal message for logs only
//! - structured [`ErrorDetails`] (batch failure indices, entity ids, ...)
//!
//! # Usage
//!
//! ```rust,ignore
//! use access_core::error::{AccessError, ErrorCode, ErrorContext, Result};
//!
//! fn endpoint(raw: &str) -> Result<Url> {
//!     Url::parse(raw).context(ErrorCode::InvalidConfiguration, "Invalid end-session endpoint")
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AccessError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Kind
// ═══════════════════════════════════════════════════════════════════════════════

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request or unknown auth type
    Validation,
    /// Duplicate assignment or grant
    Conflict,
    /// Removing an absent assignment or revoking an ungranted permission
    NotFound,
    /// Permission gate rejected the caller
    Forbidden,
    /// Identity provider or backing store unreachable
    Unavailable,
    /// Persistence or programming failure
    Internal,
}

impl ErrorKind {
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes. Numeric values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization (1000-1099)
    Forbidden,
    Unauthorized,
    RoleHierarchyCycle,

    // Session (1100-1199)
    UnsupportedAuthType,
    BlacklistWriteFailed,
    BatchLogoutFailed,

    // Persistence (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    RecordNotFound,
    DuplicateRecord,

    // Blacklist cache (2100-2199)
    CacheError,
    CacheConnectionFailed,

    // Identity provider (3000-3099)
    IdentityProviderError,
    IdentityProviderUnavailable,
    OperationTimeout,
    NetworkError,

    // Input (4100-4199)
    ValidationError,
    InvalidInput,

    // Configuration (5000-5099)
    ConfigurationError,
    InvalidConfiguration,

    // Internal (9000-9099)
    InternalError,
    SerializationError,
}

impl ErrorCode {
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::Forbidden => 1000,
            Self::Unauthorized => 1001,
            Self::RoleHierarchyCycle => 1002,
            Self::UnsupportedAuthType => 1100,
            Self::BlacklistWriteFailed => 1101,
            Self::BatchLogoutFailed => 1102,
            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::RecordNotFound => 2004,
            Self::DuplicateRecord => 2005,
            Self::CacheError => 2100,
            Self::CacheConnectionFailed => 2101,
            Self::IdentityProviderError => 3000,
            Self::IdentityProviderUnavailable => 3001,
            Self::OperationTimeout => 3002,
            Self::NetworkError => 3005,
            Self::ValidationError => 4100,
            Self::InvalidInput => 4101,
            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5002,
            Self::InternalError => 9000,
            Self::SerializationError => 9001,
        }
    }

    /// Collapse the code into the taxonomy exposed to callers.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError | Self::InvalidInput | Self::UnsupportedAuthType => ErrorKind::Validation,
            Self::DuplicateRecord => ErrorKind::Conflict,
            Self::RecordNotFound => ErrorKind::NotFound,
            Self::Forbidden | Self::Unauthorized => ErrorKind::Forbidden,

            Self::DatabaseConnectionFailed
            | Self::CacheConnectionFailed
            | Self::CacheError
            | Self::BlacklistWriteFailed
            | Self::IdentityProviderError
            | Self::IdentityProviderUnavailable
            | Self::OperationTimeout
            | Self::NetworkError => ErrorKind::Unavailable,

            Self::RoleHierarchyCycle
            | Self::BatchLogoutFailed
            | Self::DatabaseError
            | Self::ConfigurationError
            | Self::InvalidConfiguration
            | Self::InternalError
            | Self::SerializationError => ErrorKind::Internal,
        }
    }

    /// HTTP status, refined from the kind where a gateway status fits better.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::OperationTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::IdentityProviderError | Self::NetworkError => StatusCode::BAD_GATEWAY,
            _ => self.kind().http_status(),
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseConnectionFailed
                | Self::CacheConnectionFailed
                | Self::CacheError
                | Self::BlacklistWriteFailed
                | Self::IdentityProviderUnavailable
                | Self::OperationTimeout
                | Self::NetworkError
        )
    }

    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "authorization",
            1100..=1199 => "session",
            2000..=2099 => "database",
            2100..=2199 => "cache",
            3000..=3099 => "identity_provider",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            _ => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Severity level, drives the log level used by [`AccessError::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code.kind() {
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::NotFound | ErrorKind::Forbidden => Self::Low,
            ErrorKind::Unavailable => match code {
                ErrorCode::DatabaseConnectionFailed | ErrorCode::CacheConnectionFailed => Self::Critical,
                ErrorCode::BlacklistWriteFailed => Self::High,
                _ => Self::Medium,
            },
            ErrorKind::Internal => match code {
                ErrorCode::BatchLogoutFailed => Self::Medium,
                ErrorCode::InternalError => Self::Critical,
                _ => Self::High,
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Structured details attached to an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Kind of record involved (`user role`, `role permission`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl ErrorDetails {
    fn entity(entity_type: String, entity_id: String) -> Self {
        Self {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.context.is_empty() && self.entity_type.is_none() && self.entity_id.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub struct AccessError {
    code: ErrorCode,

    /// Safe to show to callers
    user_message: Cow<'static, str>,

    /// Logged, never serialized
    internal_message: Option<String>,

    details: ErrorDetails,

    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " ({})", internal)?;
        }
        Ok(())
    }
}

impl AccessError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        counter!(
            "access_errors_total",
            "code" => code.to_string(),
            "category" => code.category(),
        )
        .increment(1);
        error
    }

    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Removing or revoking something that was never there.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let (entity_type, entity_id) = (entity_type.into(), entity_id.into());
        let mut error = Self::new(ErrorCode::RecordNotFound, format!("{} not found: {}", entity_type, entity_id));
        error.details = ErrorDetails::entity(entity_type, entity_id);
        error
    }

    /// Assigning or granting something that already exists.
    pub fn conflict(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let (entity_type, entity_id) = (entity_type.into(), entity_id.into());
        let mut error = Self::new(
            ErrorCode::DuplicateRecord,
            format!("{} already exists: {}", entity_type, entity_id),
        );
        error.details = ErrorDetails::entity(entity_type, entity_id);
        error
    }

    /// An identity provider or other collaborator could not be reached.
    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        let service = service.into();
        Self::with_internal(
            ErrorCode::IdentityProviderUnavailable,
            format!("{} is temporarily unavailable", service),
            reason,
        )
        .with_context("service", &service)
    }

    pub fn hierarchy_cycle(role: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::RoleHierarchyCycle,
            format!("Cycle detected in role hierarchy: {}", role.into()),
        )
    }

    pub fn unsupported_auth_type(auth_type: impl Into<String>) -> Self {
        let auth_type = auth_type.into();
        Self::new(ErrorCode::UnsupportedAuthType, format!("unsupported auth type: {}", auth_type))
            .with_context("auth_type", &auth_type)
    }

    pub fn blacklist_write_failed(reason: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::BlacklistWriteFailed, "Failed to blacklist token", reason)
    }

    /// Aggregate failure for a best-effort batch logout.
    ///
    /// `failed_indices` keeps input order so callers can tell exactly which
    /// tokens are still live.
    pub fn batch_logout_failed(failed_indices: Vec<usize>, total: usize) -> Self {
        let failed = failed_indices.len();
        Self::new(
            ErrorCode::BatchLogoutFailed,
            format!("batch logout failed for {} tokens", failed),
        )
        .with_context("failed_count", failed)
        .with_context("total", total)
        .with_context("failed_indices", failed_indices)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// Number of failures carried by a batch logout error.
    pub fn failed_count(&self) -> Option<usize> {
        self.details
            .context
            .get("failed_count")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    }

    /// Log at a level matching the severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => error!(
                error_code = %code,
                category = self.code.category(),
                http_status = status,
                user_message = %self.user_message,
                internal_message = ?self.internal_message,
                source = ?self.source,
                "Access control error"
            ),
            ErrorSeverity::Medium => warn!(
                error_code = %code,
                http_status = status,
                user_message = %self.user_message,
                internal_message = ?self.internal_message,
                "Access control error"
            ),
            ErrorSeverity::Low => debug!(
                error_code = %code,
                http_status = status,
                user_message = %self.user_message,
                "Request rejected"
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON error envelope returned by the authorization gate.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub numeric_code: u32,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&AccessError> for ErrorResponse {
    fn from(error: &AccessError) -> Self {
        Self {
            error: ErrorBody {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                kind: error.kind(),
                message: error.user_message.to_string(),
                retryable: error.is_retryable(),
                details: (!error.details.is_empty()).then(|| error.details.clone()),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        self.log();
        (self.http_status(), Json(ErrorResponse::from(&self))).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Wrap a foreign error with a code and a user-facing message, keeping the
/// original as the source and its text as the internal message.
pub trait ErrorContext<T> {
    fn context(self, code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Result<T> {
        self.map_err(|e| AccessError::with_internal(code, message, e.to_string()).with_source(e))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for AccessError {
    fn from(error: sqlx::Error) -> Self {
        let (code, message) = match &error {
            sqlx::Error::RowNotFound => (ErrorCode::RecordNotFound, "The requested record was not found"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                (ErrorCode::DuplicateRecord, "A record with this identifier already exists")
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                (ErrorCode::DatabaseConnectionFailed, "Unable to connect to the database")
            }
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };
        Self::with_internal(code, message, error.to_string()).with_source(error)
    }
}

impl From<sqlx::migrate::MigrateError> for AccessError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::with_internal(ErrorCode::DatabaseError, "Database migration failed", error.to_string()).with_source(error)
    }
}

impl From<redis::RedisError> for AccessError {
    fn from(error: redis::RedisError) -> Self {
        let code = if error.is_connection_refusal() || error.is_connection_dropped() {
            ErrorCode::CacheConnectionFailed
        } else {
            ErrorCode::CacheError
        };
        Self::with_internal(code, "Blacklist cache operation failed", error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(ErrorCode::SerializationError, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<reqwest::Error> for AccessError {
    /// The request URL is dropped: OIDC query strings carry `id_token_hint`.
    fn from(error: reqwest::Error) -> Self {
        let error = error.without_url();
        let (code, message) = if error.is_timeout() {
            (ErrorCode::OperationTimeout, "Identity provider request timed out")
        } else if error.is_connect() {
            (ErrorCode::IdentityProviderUnavailable, "Failed to connect to identity provider")
        } else if error.status().is_some_and(|s| s.is_server_error()) {
            (ErrorCode::IdentityProviderUnavailable, "Identity provider is temporarily unavailable")
        } else if error.status().is_some() {
            (ErrorCode::IdentityProviderError, "Identity provider returned an error")
        } else {
            (ErrorCode::NetworkError, "Network error while contacting identity provider")
        };
        Self::with_internal(code, message, error.to_string()).with_source(error)
    }
}

impl From<tokio::time::error::Elapsed> for AccessError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::with_internal(ErrorCode::OperationTimeout, "Operation timed out", error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for AccessError {
    fn from(error: std::io::Error) -> Self {
        let code = match error.kind() {
            std::io::ErrorKind::TimedOut => ErrorCode::OperationTimeout,
            std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::ConnectionReset => ErrorCode::NetworkError,
            _ => ErrorCode::InternalError,
        };
        Self::with_internal(code, "An I/O error occurred", error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for AccessError {
    fn from(error: anyhow::Error) -> Self {
        error
            .downcast::<AccessError>()
            .unwrap_or_else(|e| Self::internal(format!("{:#}", e)))
    }
}

impl From<config::ConfigError> for AccessError {
    fn from(error: config::ConfigError) -> Self {
        let code = match &error {
            config::ConfigError::NotFound(_)
            | config::ConfigError::PathParse(_)
            | config::ConfigError::FileParse { .. } => ErrorCode::InvalidConfiguration,
            _ => ErrorCode::ConfigurationError,
        };
        Self::with_internal(code, "Configuration error", error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status() {
        assert_eq!(AccessError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(AccessError::conflict("user role", "alice:admin").kind(), ErrorKind::Conflict);
        assert_eq!(AccessError::not_found("user role", "alice:admin").kind(), ErrorKind::NotFound);
        assert_eq!(AccessError::unavailable("idp", "down").kind(), ErrorKind::Unavailable);
        assert_eq!(AccessError::internal("boom").kind(), ErrorKind::Internal);
        assert_eq!(AccessError::unsupported_auth_type("saml").kind(), ErrorKind::Validation);

        assert_eq!(ErrorCode::DuplicateRecord.http_status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::OperationTimeout.http_status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ErrorCode::IdentityProviderError.http_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::IdentityProviderUnavailable.http_status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_conflict_carries_entity() {
        let error = AccessError::conflict("user role", "alice:admin");
        assert_eq!(error.details().entity_type.as_deref(), Some("user role"));
        assert_eq!(error.user_message(), "user role already exists: alice:admin");
    }

    #[test]
    fn test_batch_logout_error_reports_failures() {
        let error = AccessError::batch_logout_failed(vec![1], 3);
        assert_eq!(error.code(), ErrorCode::BatchLogoutFailed);
        assert_eq!(error.failed_count(), Some(1));
        assert_eq!(error.user_message(), "batch logout failed for 1 tokens");
        assert_eq!(error.details().context["failed_indices"], serde_json::json!([1]));
        assert_eq!(AccessError::validation("x").failed_count(), None);
    }

    #[test]
    fn test_severity() {
        assert_eq!(AccessError::validation("x").severity(), ErrorSeverity::Low);
        assert_eq!(AccessError::blacklist_write_failed("down").severity(), ErrorSeverity::High);
        assert_eq!(AccessError::internal("boom").severity(), ErrorSeverity::Critical);
        assert!(AccessError::blacklist_write_failed("down").is_retryable());
        assert!(!ErrorCode::DuplicateRecord.is_retryable());
    }

    #[test]
    fn test_context_keeps_source_text() {
        let parsed: std::result::Result<u32, _> = "x".parse::<u32>();
        let error = parsed.context(ErrorCode::InvalidConfiguration, "bad number").unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidConfiguration);
        assert_eq!(error.user_message(), "bad number");
        assert!(error.internal_message().is_some());
    }

    #[test]
    fn test_response_hides_internal_message() {
        let error = AccessError::with_internal(ErrorCode::DatabaseError, "A database error occurred", "secret dsn");
        let body = serde_json::to_string(&ErrorResponse::from(&error)).unwrap();
        assert!(!body.contains("secret dsn"));
        assert!(body.contains("\"numeric_code\":2000"));
    }
}
