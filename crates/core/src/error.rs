//! Error types for the cutting-stock engine.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the optimizer.
///
/// Infeasible pieces and unfinished packing are not errors: they are reported
/// on the returned result so a caller always receives a best-effort layout.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// A request field failed validation (piece dimensions, unknown type ids, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The plate footprint has a non-positive or non-finite dimension.
    #[error("invalid container {width} x {length}: dimensions must be positive")]
    InvalidContainer {
        /// Requested plate width.
        width: f64,
        /// Requested plate length.
        length: f64,
    },

    /// The layer cap must allow at least one layer.
    #[error("invalid layer limit {0}: at least one layer per plate is required")]
    InvalidLayerLimit(usize),

    /// A strategy pool worker panicked while running a task.
    #[error("worker failed while running task {task}: {reason}")]
    WorkerFailure {
        /// Id of the task that was running.
        task: u64,
        /// Panic payload, when it was a string.
        reason: String,
    },

    /// The task was cancelled before it produced a result.
    #[error("task {0} was cancelled")]
    Cancelled(u64),

    /// The strategy pool has been shut down and accepts no more tasks.
    #[error("strategy pool is shut down")]
    PoolShutdown,

    /// Unexpected internal state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true for errors caused by the caller's request.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::InvalidContainer { .. } | Self::InvalidLayerLimit(_)
        )
    }
}
