//! SQLite-backed trope catalog and command executor.
//!
//! [`Store`] wraps one `rusqlite` connection with foreign keys enforced.
//! Commands run inside a transaction and are checked before preparation:
//! the placeholder count must equal the parameter count, and a command
//! declared as a read must compile to a read-only statement.

mod catalog;
pub mod schema;
mod value;

use std::path::Path;

use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::query::{OperationKind, QueryCommand};

pub use catalog::NewWork;

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Rows of a read-only statement, keyed by column name.
    Rows(Vec<Map<String, Value>>),
    /// Rows changed by a mutating statement.
    Affected(usize),
}

impl ExecutionOutcome {
    /// Number of rows returned or affected.
    pub fn count(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Affected(n) => *n,
        }
    }
}

/// The relational trope catalog.
pub struct Store {
    conn: Connection,
    location: String,
}

impl Store {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let open_err = |source| StoreError::Open {
            path: path.display().to_string(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(open_err)?;
        tracing::debug!(path = %path.display(), "opened catalog");
        Ok(Self {
            conn,
            location: path.display().to_string(),
        })
    }

    /// A private in-memory catalog.
    pub fn in_memory() -> StoreResult<Self> {
        let open_err = |source| StoreError::Open {
            path: ":memory:".into(),
            source,
        };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(open_err)?;
        Ok(Self {
            conn,
            location: ":memory:".into(),
        })
    }

    /// Where the catalog lives: a file path or `:memory:`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Create the catalog tables if they do not exist.
    pub fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    /// Whether every catalog table exists.
    pub fn has_schema(&self) -> StoreResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        for table in schema::TABLES {
            let n: i64 = stmt.query_row([table], |row| row.get(0))?;
            if n == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Execute a resolved command inside a transaction.
    pub fn execute(&mut self, command: &QueryCommand) -> StoreResult<ExecutionOutcome> {
        let placeholders = command.placeholder_count();
        let parameters = command.parameters.len();
        if placeholders != parameters {
            return Err(StoreError::PlaceholderMismatch {
                placeholders,
                parameters,
            });
        }

        let tx = self.conn.transaction()?;
        let outcome = {
            let mut stmt = tx.prepare(&command.command_text)?;
            if stmt.parameter_count() != parameters {
                return Err(StoreError::PlaceholderMismatch {
                    placeholders: stmt.parameter_count(),
                    parameters,
                });
            }
            let read_only = stmt.readonly();
            if command.operation == OperationKind::Read && !read_only {
                return Err(StoreError::OperationMismatch {
                    command: command.command_text.clone(),
                });
            }

            if read_only {
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(str::to_string).collect();
                let mut rows = stmt.query(params_from_iter(command.parameters.iter()))?;
                let mut objects = Vec::new();
                while let Some(row) = rows.next()? {
                    objects.push(value::row_to_object(row, &columns)?);
                }
                ExecutionOutcome::Rows(objects)
            } else {
                ExecutionOutcome::Affected(stmt.execute(params_from_iter(command.parameters.iter()))?)
            }
        };
        tx.commit()?;

        tracing::debug!(
            operation = %command.operation,
            count = outcome.count(),
            "command executed"
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.location)
            .finish()
    }
}
