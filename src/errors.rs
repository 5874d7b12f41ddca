//! Error types for preload.

use crate::classmap::ClassMapError;
use crate::report::OutputError;

/// Top-level error type for preload operations.
///
/// Per-file faults never surface here; they are downgraded to
/// [`Diagnostic`](crate::report::Diagnostic)s during the load pass.
#[derive(Debug, thiserror::Error)]
pub enum PreloadError {
    #[error("no root paths configured")]
    NoPaths,

    #[error("class map error: {0}")]
    ClassMap(#[from] ClassMapError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Map an error to its exit code.
pub fn exit_code(error: &PreloadError) -> i32 {
    match error {
        PreloadError::NoPaths => 5,
        PreloadError::ClassMap(_) => 2,
        PreloadError::Output(_) => 1,
    }
}
