//! Persistence abstraction and SQLite implementation.

/// Relational SQLite mirror.
pub mod sqlite;

use thiserror::Error;

use crate::{op::StoredOp, types::OpSeq};

/// Persistence failure surfaced to the write caller.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Queue wiring, task joins, or corrupt mirrored rows.
    #[error("{0}")]
    Message(String),
}

/// Alias for persistence results.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination that mirrors store mutations durably.
///
/// Implementations must apply each batch atomically: either every op in the
/// slice lands or none do.
pub trait StoreSink: Send {
    /// Applies a batch of ops, returning the highest sequence applied.
    fn apply_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;

    /// Forces buffered state to durable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
