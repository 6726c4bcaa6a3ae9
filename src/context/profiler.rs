//! CPU profiler boundary.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("profiler is not available in this build")]
    Unavailable,

    #[error("failed to start profiler: {0}")]
    Start(String),
}

pub trait Profiler: Send + Sync {
    /// Start writing a profile to `path`.
    fn start(&self, path: &Path) -> Result<(), ProfilerError>;

    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Profiler used when none is compiled in. Start always fails.
#[derive(Debug, Default)]
pub struct UnavailableProfiler;

impl Profiler for UnavailableProfiler {
    fn start(&self, _path: &Path) -> Result<(), ProfilerError> {
        Err(ProfilerError::Unavailable)
    }

    fn stop(&self) {}

    fn is_running(&self) -> bool {
        false
    }
}
