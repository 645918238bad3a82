// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # tropedb
//!
//! An AI-assisted trope catalog. Natural-language requests become
//! parameterized SQL; free-text descriptions are classified against the
//! catalog's controlled vocabulary of tropes.
//!
//! ## Architecture
//!
//! - **Providers** (`provider`): Anthropic, OpenAI, OpenRouter and Ollama behind one
//!   `TextGenerator` capability, enabled by credential presence
//! - **Repair** (`repair`): ordered, idempotent rewrites of near-JSON model output
//! - **Query synthesis** (`query`): provider failover, placeholder reconciliation and a
//!   deterministic keyword fallback
//! - **Classification** (`classify`): AI tier validated against the catalog, keyword tier
//!   as backup
//! - **Store** (`store`): SQLite catalog and transactional command execution
//!
//! ## Library usage
//!
//! ```no_run
//! use tropedb::engine::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let response = engine.natural_query("slow burn romances").unwrap();
//! println!("{} rows via {}", response.count, response.command.provenance);
//! ```

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod paths;
pub mod provider;
pub mod query;
pub mod repair;
pub mod store;
