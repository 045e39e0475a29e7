use crate::domain::model::{HealthStatus, ModelHealth, SystemHealth};
use crate::utils::perf_log::unix_timestamp;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct ModelCounters {
    total_attempts: u64,
    successful_attempts: u64,
    total_duration: f64,
    last_used: f64,
}

/// Per-model attempt counters, shared across concurrent requests.
#[derive(Debug, Default)]
pub struct ModelMetrics {
    counters: Mutex<HashMap<String, ModelCounters>>,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, model_name: &str, success: bool, duration: f64) {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = counters.entry(model_name.to_string()).or_default();
        entry.total_attempts += 1;
        if success {
            entry.successful_attempts += 1;
        }
        entry.total_duration += duration;
        entry.last_used = unix_timestamp();
    }

    /// 1.0 for a model that has not been tried yet.
    pub fn success_rate(&self, model_name: &str) -> f64 {
        self.snapshot()
            .get(model_name)
            .map(rate)
            .unwrap_or(1.0)
    }

    pub fn health(&self) -> SystemHealth {
        let models: BTreeMap<String, ModelHealth> = self
            .snapshot()
            .into_iter()
            .map(|(name, c)| {
                let success_rate = rate(&c);
                let health = ModelHealth {
                    success_rate,
                    total_attempts: c.total_attempts,
                    successful_attempts: c.successful_attempts,
                    average_duration: if c.total_attempts > 0 {
                        c.total_duration / c.total_attempts as f64
                    } else {
                        0.0
                    },
                    last_used: c.last_used,
                    status: HealthStatus::from_success_rate(success_rate),
                };
                (name, health)
            })
            .collect();

        let overall_health = if models.values().all(|m| m.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        SystemHealth {
            models,
            overall_health,
            timestamp: unix_timestamp(),
        }
    }

    fn snapshot(&self) -> HashMap<String, ModelCounters> {
        match self.counters.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn rate(c: &ModelCounters) -> f64 {
    if c.total_attempts == 0 {
        1.0
    } else {
        c.successful_attempts as f64 / c.total_attempts as f64
    }
}
