//! The module contains the errors the ledger can return.
//!
//! The errors are:
//!
//! - [`Validation`] malformed input, rejected before any write.
//! - [`Ownership`] a referenced row is missing or outside the household.
//! - [`Conflict`] a uniqueness or linkage invariant would be broken.
//! - [`IntegrityViolation`] a guard found drift or a broken invariant.
//! - [`Transient`] storage contention or timeout; retrying is safe.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Ownership`]: EngineError::Ownership
//!  [`Conflict`]: EngineError::Conflict
//!  [`IntegrityViolation`]: EngineError::IntegrityViolation
//!  [`Transient`]: EngineError::Transient
use sea_orm::{ConnAcquireErr, DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

/// Ledger errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found in household: {0}")]
    Ownership(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("Transient storage failure: {0}")]
    Transient(String),
    #[error(transparent)]
    Database(DbErr),
}

/// Coarse classification used for alerting and retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Ownership,
    Conflict,
    IntegrityViolation,
    Transient,
    Database,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Ownership => "ownership",
            Self::Conflict => "conflict",
            Self::IntegrityViolation => "integrity_violation",
            Self::Transient => "transient",
            Self::Database => "database",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Ownership(_) => ErrorKind::Ownership,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Database(_) => ErrorKind::Database,
        }
    }

    /// Only transient failures are safe to retry as a whole unit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        if let DbErr::ConnectionAcquire(ConnAcquireErr::Timeout) = err {
            return Self::Transient("timed out acquiring a connection".to_string());
        }
        if let Some(SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
            return Self::Conflict(msg);
        }
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("database is locked") || text.contains("database is busy") {
            return Self::Transient(err.to_string());
        }
        Self::Database(err)
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Ownership(a), Self::Ownership(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::IntegrityViolation(a), Self::IntegrityViolation(b)) => a == b,
            (Self::Transient(a), Self::Transient(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
