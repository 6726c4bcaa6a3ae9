//! Admin access log sink.
//!
//! One line per dispatched request:
//! ```text
//! [1760575502123] "POST /healthcheck/fail" 200 3
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{Method, StatusCode};

const DISABLED_PATH: &str = "/dev/null";

#[derive(Debug, Default)]
pub struct AccessLog {
    file: Option<Mutex<File>>,
}

impl AccessLog {
    /// Open `path` for appending. `/dev/null` yields a disabled log.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if path == Path::new(DISABLED_PATH) {
            return Ok(Self::disabled());
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn log(&self, method: &Method, path_and_query: &str, status: StatusCode, bytes: usize) {
        let Some(file) = &self.file else {
            return;
        };
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let line = format!(
            "[{}] \"{} {}\" {} {}\n",
            millis,
            method,
            path_and_query,
            status.as_u16(),
            bytes
        );
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!(error = %e, "Failed to write admin access log");
        }
    }
}
