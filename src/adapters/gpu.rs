use crate::domain::ports::MemoryProbe;
use crate::utils::error::{JarvisError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::process::Command;

const QUERY_FIELDS: &str = "name,utilization.gpu,memory.free,memory.used,memory.total,temperature.gpu";

/// Snapshot of the first GPU reported by `nvidia-smi`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuStatus {
    pub name: String,
    /// Utilisation as a fraction in `0.0..=1.0`.
    pub load: f64,
    pub free_memory_mb: u64,
    pub used_memory_mb: u64,
    pub total_memory_mb: u64,
    pub temperature_c: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: String,
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl NvidiaSmi {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    fn query(&self, fields: &str) -> Result<String> {
        let output = Command::new(&self.program)
            .arg(format!("--query-gpu={}", fields))
            .arg("--format=csv,noheader,nounits")
            .output()
            .map_err(|e| JarvisError::CommandError {
                command: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(JarvisError::CommandError {
                command: self.program.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn status(&self) -> Result<GpuStatus> {
        let stdout = self.query(QUERY_FIELDS)?;
        let first = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| JarvisError::CommandError {
                command: self.program.clone(),
                message: "no GPU reported".to_string(),
            })?;
        parse_csv_line(first)
    }

    /// Appends the current status as one JSON line and returns it. Failures
    /// are logged, and the file is left untouched when no status is read.
    pub fn log_status(&self, path: &Path) -> Option<GpuStatus> {
        let result = self.status().and_then(|status| {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            writeln!(file, "{}", serde_json::to_string(&status)?)?;
            Ok(status)
        });
        match result {
            Ok(status) => {
                tracing::debug!("GPU status appended to {}", path.display());
                Some(status)
            }
            Err(e) => {
                tracing::error!("Error logging GPU status: {}", e);
                None
            }
        }
    }
}

impl MemoryProbe for NvidiaSmi {
    fn total_memory_mb(&self) -> Option<u64> {
        match self.query("memory.total") {
            Ok(stdout) => stdout.lines().next().and_then(|l| l.trim().parse().ok()),
            Err(e) => {
                tracing::debug!("GPU memory probe unavailable: {}", e);
                None
            }
        }
    }
}

/// Parses `name, load%, free, used, total, temperature` as printed with
/// `--format=csv,noheader,nounits`.
pub fn parse_csv_line(line: &str) -> Result<GpuStatus> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return Err(JarvisError::InvalidResponse {
            provider: "nvidia-smi".to_string(),
            message: format!("expected 6 columns, got {}: '{}'", fields.len(), line.trim()),
        });
    }

    let number = |index: usize| -> Result<f64> {
        fields[index].parse::<f64>().map_err(|_| JarvisError::InvalidResponse {
            provider: "nvidia-smi".to_string(),
            message: format!("column {} is not numeric: '{}'", index + 1, fields[index]),
        })
    };

    Ok(GpuStatus {
        name: fields[0].to_string(),
        load: number(1)? / 100.0,
        free_memory_mb: number(2)? as u64,
        used_memory_mb: number(3)? as u64,
        total_memory_mb: number(4)? as u64,
        temperature_c: number(5)?,
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}
