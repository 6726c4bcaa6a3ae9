//! Hot-restart boundary.

pub trait HotRestart: Send + Sync {
    /// Compatibility string shared between a parent and child process.
    fn version(&self) -> String;

    /// 0 for the first process, incremented on every hot restart.
    fn restart_epoch(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct DisabledHotRestart;

impl HotRestart for DisabledHotRestart {
    fn version(&self) -> String {
        "disabled".to_string()
    }

    fn restart_epoch(&self) -> u64 {
        0
    }
}
