//! Error types for redops.
//!
//! This module defines all error types using `thiserror`. Codec errors are
//! always handed back to the immediate caller; nothing in the crate logs and
//! swallows them or retries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Parse error: invalid unix timestamp {input:?}: {message}")]
    Parse { input: String, message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{type_name}: unmarshal target is null")]
    NilTarget { type_name: &'static str },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Pool error: {message}")]
    Pool { message: String, retryable: bool },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Unknown color: {name}")]
    UnknownColor { name: String },
}

impl StoreError {
    /// Create a parse error for a malformed wire integer.
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Create a nil target error.
    pub fn nil_target(type_name: &'static str) -> Self {
        Self::NilTarget { type_name }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a pool error.
    pub fn pool(message: impl Into<String>, retryable: bool) -> Self {
        Self::Pool {
            message: message.into(),
            retryable,
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unknown color error.
    pub fn unknown_color(name: impl Into<String>) -> Self {
        Self::UnknownColor { name: name.into() }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Pool { retryable, .. } => *retryable,
            Self::Redis(err) => err.is_io_error() || err.is_timeout() || err.is_connection_dropped(),
            _ => false,
        }
    }
}

impl From<deadpool::managed::PoolError<redis::RedisError>> for StoreError {
    fn from(err: deadpool::managed::PoolError<redis::RedisError>) -> Self {
        use deadpool::managed::PoolError;
        match err {
            PoolError::Backend(err) => StoreError::Redis(err),
            PoolError::Timeout(kind) => {
                StoreError::pool(format!("timed out waiting for connection ({kind:?})"), true)
            }
            PoolError::Closed => StoreError::pool("pool is closed", false),
            other => StoreError::pool(other.to_string(), false),
        }
    }
}

/// Convert sqlx errors to StoreError.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                StoreError::database(db_err.message(), code)
            }
            sqlx::Error::PoolTimedOut => StoreError::pool("sql pool acquire timed out", true),
            sqlx::Error::PoolClosed => StoreError::pool("sql pool is closed", false),
            sqlx::Error::Io(io_err) => StoreError::pool(format!("I/O error: {}", io_err), true),
            other => StoreError::database(other.to_string(), None),
        }
    }
}

/// Result type alias for redops operations.
pub type StoreResult<T> = Result<T, StoreError>;
