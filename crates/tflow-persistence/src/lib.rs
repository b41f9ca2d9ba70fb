//! Storage collaborator for the refresh engine.
//!
//! - [`Storage`]: the operations the scheduler needs (create, read-latest,
//!   query by entity and time range)
//! - [`MemoryStore`]: in-process store with write-failure injection and
//!   bounded history ([`Retention`])
//! - [`JsonLinesStore`]: memory store plus an append-only daily `.jsonl`
//!   audit log

pub mod config;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod storage;
pub mod writer;

pub use config::Retention;
pub use error::{PersistenceError, PersistenceResult};
pub use jsonl::JsonLinesStore;
pub use memory::MemoryStore;
pub use storage::{BoxFuture, Storage};
pub use writer::{AuditRecord, JsonLinesWriter};
