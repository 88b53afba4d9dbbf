//! Error types for gate operations

use thiserror::Error;

/// Errors surfaced by a [`Gate`](crate::Gate) handle
///
/// Normal operation never fails; these only report a driver task that is
/// no longer running (runtime shut down, or the task panicked in a job).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("gate driver has stopped")]
    Closed,
}
