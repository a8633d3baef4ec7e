//! Runner configuration
//!
//! Defines all configurable parameters for the runner: orchestrator
//! connection, polling and heartbeat intervals, the generator CLI and
//! where task directories and artifacts live.

use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Identity stamped on every claim and heartbeat
    pub worker_id: String,

    /// Orchestrator base URL (e.g., "http://localhost:8080")
    pub orchestrator_url: String,

    /// How often to poll the orchestrator for waiting jobs
    pub poll_interval: Duration,

    /// How often to renew the lease of each running job
    pub heartbeat_interval: Duration,

    /// Max jobs executed concurrently
    pub max_parallel_jobs: usize,

    /// Generator CLI executable
    pub generator_command: String,

    /// Extra arguments placed before the prompt
    pub generator_args: Vec<String>,

    /// Root under which each task gets its own directory
    pub generator_work_dir: PathBuf,

    /// Timeout for tasks that do not set their own
    pub generator_timeout: Duration,

    /// Where generated artifacts are saved
    pub artifacts_dir: PathBuf,

    /// How often stale task directories are swept
    pub cleanup_interval: Duration,

    /// Age after which a task directory is removed
    pub cleanup_max_age: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String, orchestrator_url: String) -> Self {
        Self {
            worker_id,
            orchestrator_url,
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
            max_parallel_jobs: 2,
            generator_command: "cline".to_string(),
            generator_args: Vec::new(),
            generator_work_dir: std::env::temp_dir().join("cline-tasks"),
            generator_timeout: Duration::from_millis(300_000),
            artifacts_dir: PathBuf::from("./artifacts"),
            cleanup_interval: Duration::from_secs(600),
            cleanup_max_age: Duration::from_secs(3600),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; unset ones keep their default:
    /// - WORKER_ID (default: random `worker-<uuid>`)
    /// - ORCHESTRATOR_URL (default: http://localhost:8080)
    /// - POLL_INTERVAL (seconds, default: 5)
    /// - HEARTBEAT_INTERVAL (seconds, default: 15)
    /// - MAX_PARALLEL_JOBS (default: 2)
    /// - GENERATOR_COMMAND (default: cline)
    /// - GENERATOR_ARGS (whitespace-separated, default: none)
    /// - GENERATOR_WORK_DIR (default: $TMPDIR/cline-tasks)
    /// - GENERATOR_TIMEOUT_MS (default: 300000)
    /// - ARTIFACTS_DIR (default: ./artifacts)
    /// - CLEANUP_INTERVAL (seconds, default: 600)
    /// - CLEANUP_MAX_AGE (seconds, default: 3600)
    ///
    /// Fails when a numeric variable is set but does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(worker_id) = std::env::var("WORKER_ID") {
            config.worker_id = worker_id;
        }
        if let Ok(url) = std::env::var("ORCHESTRATOR_URL") {
            config.orchestrator_url = url;
        }
        if let Some(secs) = parse_var::<u64>("POLL_INTERVAL")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("HEARTBEAT_INTERVAL")? {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>("MAX_PARALLEL_JOBS")? {
            config.max_parallel_jobs = max;
        }
        if let Ok(command) = std::env::var("GENERATOR_COMMAND") {
            config.generator_command = command;
        }
        if let Ok(args) = std::env::var("GENERATOR_ARGS") {
            config.generator_args = split_args(&args);
        }
        if let Ok(dir) = std::env::var("GENERATOR_WORK_DIR") {
            config.generator_work_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var::<u64>("GENERATOR_TIMEOUT_MS")? {
            config.generator_timeout = Duration::from_millis(ms);
        }
        if let Ok(dir) = std::env::var("ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_var::<u64>("CLEANUP_INTERVAL")? {
            config.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>("CLEANUP_MAX_AGE")? {
            config.cleanup_max_age = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        if self.orchestrator_url.is_empty() {
            anyhow::bail!("orchestrator_url cannot be empty");
        }

        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            anyhow::bail!("orchestrator_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.heartbeat_interval.is_zero() {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        if self.max_parallel_jobs == 0 {
            anyhow::bail!("max_parallel_jobs must be greater than 0");
        }

        if self.generator_command.trim().is_empty() {
            anyhow::bail!("generator_command cannot be empty");
        }

        if self.generator_timeout.is_zero() {
            anyhow::bail!("generator_timeout must be greater than 0");
        }

        if self.cleanup_interval.is_zero() {
            anyhow::bail!("cleanup_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            format!("worker-{}", uuid::Uuid::new_v4()),
            "http://localhost:8080".to_string(),
        )
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.worker_id.starts_with("worker-"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.max_parallel_jobs, 2);
        assert_eq!(config.generator_command, "cline");
        assert_eq!(config.generator_timeout, Duration::from_millis(300_000));
        assert!(config.generator_work_dir.ends_with("cline-tasks"));
        assert_eq!(config.cleanup_max_age, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Empty worker_id should fail
        config.worker_id = String::new();
        assert!(config.validate().is_err());

        config.worker_id = "test".to_string();

        // Invalid URL should fail
        config.orchestrator_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.orchestrator_url = "http://localhost:8080".to_string();
        assert!(config.validate().is_ok());

        config.max_parallel_jobs = 0;
        assert!(config.validate().is_err());

        config.max_parallel_jobs = 1;
        config.heartbeat_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("  --model   fast\t--quiet "), vec!["--model", "fast", "--quiet"]);
        assert!(split_args("   ").is_empty());
    }
}
