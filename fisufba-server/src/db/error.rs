//! Storage error taxonomy
//!
//! Every `sqlx::Error` is classified exactly once, here, and travels upward
//! unchanged in kind. Callers match on the variant, never on driver text.

use std::time::Duration;

/// Which integrity rule a write broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
}

impl ConstraintKind {
    /// Map a PostgreSQL SQLSTATE from class 23 (integrity constraint violation).
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            "23505" => Some(Self::Unique),
            "23503" => Some(Self::ForeignKey),
            "23502" => Some(Self::NotNull),
            "23514" => Some(Self::Check),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::ForeignKey => "foreign_key",
            Self::NotNull => "not_null",
            Self::Check => "check",
        }
    }
}

/// Errors surfaced by the persistence gateway
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("{} constraint violated{}", .kind.as_str(), constraint_suffix(.constraint))]
    ConstraintViolation {
        kind: ConstraintKind,
        constraint: Option<String>,
    },

    /// Transient: the database could not be reached or dropped the connection
    #[error("database unavailable: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// Transient: no pooled connection became free in time
    #[error("no database connection available within {timeout:?}")]
    PoolExhausted { timeout: Duration },

    /// Transient: the operation exceeded its deadline and was rolled back
    /// `after` is known when the client-side deadline fired
    #[error("database operation timed out")]
    Timeout { after: Option<Duration> },

    #[error("database error: {0}")]
    Internal(#[source] sqlx::Error),
}

/// SQLSTATE codes that mean "try again later" rather than "you did it wrong"
const TRANSIENT_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "57P01", // admin_shutdown
    "57P03", // cannot_connect_now
    "53300", // too_many_connections
];

/// statement_timeout fired on the server
const QUERY_CANCELED: &str = "57014";

impl StorageError {
    /// Transient kinds are safe to retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connectivity(_) | Self::PoolExhausted { .. } | Self::Timeout { .. }
        )
    }

    /// Name of the violated constraint, when the database reported one.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            Self::ConstraintViolation { constraint, .. } => constraint.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Classify with the pool's acquire timeout attached to `PoolTimedOut`.
    pub(crate) fn classify(err: sqlx::Error, acquire_timeout: Duration) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::PoolExhausted {
                timeout: acquire_timeout,
            },
            other => Self::from(other),
        }
    }
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    constraint
        .as_deref()
        .map(|c| format!(": {}", c))
        .unwrap_or_default()
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource: "row",
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut => Self::PoolExhausted {
                timeout: Duration::ZERO,
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connectivity(err),
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                let constraint = db.constraint().map(str::to_owned);
                let err = sqlx::Error::Database(db);
                match code.as_deref() {
                    Some(code) => match ConstraintKind::from_sqlstate(code) {
                        Some(kind) => Self::ConstraintViolation { kind, constraint },
                        None if code == QUERY_CANCELED => Self::Timeout { after: None },
                        None if TRANSIENT_SQLSTATES.contains(&code) => Self::Connectivity(err),
                        None => Self::Internal(err),
                    },
                    None => Self::Internal(err),
                }
            }
            other => Self::Internal(other),
        }
    }
}
