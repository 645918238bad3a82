//! Rich diagnostic error types for tropedb.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Provider and candidate errors are
//! recovered inside the query chain and never surface here; only the store,
//! configuration and path layers produce caller-visible failures.

use miette::Diagnostic;
use thiserror::Error;

use crate::paths::PathError;

/// Top-level error type for tropedb.
///
/// Each variant wraps a subsystem-specific error, preserving the diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TropeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("failed to open database at {path}")]
    #[diagnostic(
        code(tropedb::store::open),
        help(
            "Check that the parent directory exists and is writable. \
             Run `tropedb init` to create a fresh catalog."
        )
    )]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {source}")]
    #[diagnostic(
        code(tropedb::store::sqlite),
        help(
            "The database rejected the command. If this came from a natural-language \
             query, rephrase the request or inspect it with `tropedb query --dry-run`."
        )
    )]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    #[error("command declares {placeholders} placeholder(s) but carries {parameters} parameter(s)")]
    #[diagnostic(
        code(tropedb::store::placeholder_mismatch),
        help(
            "Every command must be reconciled before execution. \
             This indicates a bug in the parameter reconciler; please file a report."
        )
    )]
    PlaceholderMismatch {
        placeholders: usize,
        parameters: usize,
    },

    #[error("command was declared read-only but modifies the catalog: {command}")]
    #[diagnostic(
        code(tropedb::store::operation_mismatch),
        help("Read requests may not mutate data. The command was rejected without executing.")
    )]
    OperationMismatch { command: String },

    #[error("trope \"{name}\" is not in the catalog")]
    #[diagnostic(
        code(tropedb::store::unknown_trope),
        help("Classification results must name existing tropes. No examples were recorded.")
    )]
    UnknownTrope { name: String },

    #[error("catalog unavailable: {message}")]
    #[diagnostic(
        code(tropedb::store::catalog),
        help("The tropes table could not be read. Run `tropedb init` or check the database path.")
    )]
    CatalogUnavailable { message: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(tropedb::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(tropedb::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(tropedb::config::parse),
        help("Check the TOML syntax. Unknown provider names in `order` are rejected.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(tropedb::config::invalid), help("{message}"))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias used at the engine boundary.
pub type TropeResult<T> = std::result::Result<T, TropeError>;
