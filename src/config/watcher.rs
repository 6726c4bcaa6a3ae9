//! Runtime override file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::runtime::RuntimeLoader;

/// Watches the runtime override file and reloads the override layer on change.
pub struct RuntimeWatcher {
    path: PathBuf,
    loader: Arc<RuntimeLoader>,
}

impl RuntimeWatcher {
    pub fn new(path: &Path, loader: Arc<RuntimeLoader>) -> Self {
        Self {
            path: path.to_path_buf(),
            loader,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let loader = Arc::clone(&self.loader);
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Runtime override change detected, reloading");
                        if let Err(e) = loader.load_override_file(&path) {
                            tracing::error!(error = %e, "Failed to reload runtime overrides, keeping current snapshot");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Runtime watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    #[tokio::test]
    async fn rewrite_reloads_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "flag = 1").unwrap();

        let loader = Arc::new(RuntimeLoader::new(BTreeMap::new()));
        loader.load_override_file(file.path()).unwrap();
        let _watcher = RuntimeWatcher::new(file.path(), Arc::clone(&loader))
            .run()
            .unwrap();

        std::fs::write(file.path(), "flag = 2\n").unwrap();

        let mut reloaded = false;
        for _ in 0..50 {
            if loader.snapshot().get_integer("flag", 0) == 2 {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(reloaded);
    }
}
