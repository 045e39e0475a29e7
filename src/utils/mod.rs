pub mod error;
pub mod logger;
#[cfg(feature = "cli")]
pub mod monitor;
pub mod perf_log;
pub mod validation;
