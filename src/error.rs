// ============================================================================
// error.rs — wator
// Error types surfaced by the engine and its configuration layer.
// ============================================================================

use thiserror::Error;

/// Errors raised while building or driving a simulation.
#[derive(Debug, Error)]
pub enum WatorError {
    /// A configuration value that can never produce a valid simulation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Grid dimensions below 1x1.
    #[error("grid dimensions must be at least 1x1 (got {width}x{height})")]
    InvalidDimensions { width: usize, height: usize },
    /// A worker left the pool mid-generation, so the "exactly N workers per
    /// generation" invariant no longer holds.
    #[error("generation quorum broken: a worker left the pool mid-generation")]
    QuorumBroken,
    /// The worker pool was shut down; the simulation can no longer advance.
    #[error("worker pool has been shut down")]
    PoolStopped,
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A textual grid could not be parsed.
    #[error("malformed grid text: {0}")]
    GridParse(String),
}

pub type Result<T> = std::result::Result<T, WatorError>;
