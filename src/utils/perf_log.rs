//! Append-only JSON-lines log of model attempts and exhausted fallback chains.

use crate::domain::model::ModelAttempt;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PerformanceEvent {
    ModelAttempt {
        model_name: String,
        success: bool,
        error: Option<String>,
        duration: f64,
        retry_count: u32,
        task: String,
        fallback_chain: Vec<String>,
        fallback_index: usize,
    },
    FallbackChainExhausted {
        task: String,
        fallback_chain: Vec<String>,
        attempts: Vec<ModelAttempt>,
        last_error: Option<String>,
    },
}

#[derive(Serialize)]
struct Stamped<'a> {
    #[serde(flatten)]
    event: &'a PerformanceEvent,
    timestamp: f64,
}

/// Writers are serialized so concurrent tasks never interleave lines.
pub struct PerformanceLog {
    path: Option<PathBuf>,
    lock: Mutex<()>,
}

impl PerformanceLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, event: PerformanceEvent) {
        let Some(path) = &self.path else {
            return;
        };

        let stamped = Stamped {
            event: &event,
            timestamp: unix_timestamp(),
        };
        let line = match serde_json::to_string(&stamped) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to serialize performance event: {}", e);
                return;
            }
        };

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = result {
            tracing::error!("Failed to write performance log {}: {}", path.display(), e);
        }
    }
}

pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
