//! Error types for path mutation and elevation sampling.

use thiserror::Error;

/// Errors raised by path mutation operations.
///
/// These indicate programming or input errors and propagate to the caller;
/// they are never swallowed inside the engine. Failures during candidate
/// construction in the search are handled separately by degrading the
/// candidate's cost.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("point index {index} out of range for {len} points")]
    OutOfRange { index: usize, len: usize },

    #[error("cannot modify endpoint {0} while the path is locked")]
    LockedEndpoint(usize),

    #[error("no elevation available at ({x}, {y})")]
    Sample { x: i32, y: i32 },

    #[error("no elevation source configured")]
    MissingElevation,
}
