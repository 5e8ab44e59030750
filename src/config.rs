use chrono::Duration;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

/// Runtime configuration, environment-driven with sane defaults.
///
/// Invalid values warn and fall back to the default rather than aborting.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub db_path: PathBuf,
    pub correlation_window_seconds: u64,
    pub store_retry_max_attempts: u32,
    pub store_retry_delay_ms: u64,
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let db_path = PathBuf::from(env_string("MONITOR_DB_PATH", "monitor.db"));
        let correlation_window_seconds =
            env_u64("MONITOR_CORRELATION_WINDOW_SECONDS", 3600);
        let store_retry_max_attempts =
            env_u64("MONITOR_STORE_RETRY_MAX_ATTEMPTS", 5) as u32;
        let store_retry_delay_ms = env_u64("MONITOR_STORE_RETRY_DELAY_MS", 100);

        Self {
            db_path,
            correlation_window_seconds,
            store_retry_max_attempts,
            store_retry_delay_ms,
        }
        .clamped()
    }

    /// Normalizes tuning knobs to workable bounds.
    pub fn clamped(mut self) -> Self {
        self.correlation_window_seconds = self.correlation_window_seconds.max(60);
        self.store_retry_max_attempts = self.store_retry_max_attempts.clamp(1, 100);
        self.store_retry_delay_ms = self.store_retry_delay_ms.min(10_000);
        self
    }

    pub fn correlation_window(&self) -> Duration {
        Duration::seconds(self.correlation_window_seconds as i64)
    }

    pub fn retry_policy(&self) -> crate::store::RetryPolicy {
        crate::store::RetryPolicy {
            max_attempts: self.store_retry_max_attempts,
            delay: StdDuration::from_millis(self.store_retry_delay_ms),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("monitor.db"),
            correlation_window_seconds: 3600,
            store_retry_max_attempts: 5,
            store_retry_delay_ms: 100,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %value, default, "unparseable value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_keeps_knobs_workable() {
        let config = MonitorConfig {
            db_path: PathBuf::from("monitor.db"),
            correlation_window_seconds: 1,
            store_retry_max_attempts: 0,
            store_retry_delay_ms: 60_000,
        }
        .clamped();

        assert_eq!(config.correlation_window_seconds, 60);
        assert_eq!(config.store_retry_max_attempts, 1);
        assert_eq!(config.store_retry_delay_ms, 10_000);
    }

    #[test]
    fn window_and_policy_conversions() {
        let config = MonitorConfig::default();
        assert_eq!(config.correlation_window(), Duration::hours(1));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, StdDuration::from_millis(100));
    }

    #[test]
    fn env_values_override_defaults_and_bad_values_fall_back() {
        std::env::set_var("MONITOR_DB_PATH", "/tmp/test-monitor.db");
        std::env::set_var("MONITOR_CORRELATION_WINDOW_SECONDS", "7200");
        std::env::set_var("MONITOR_STORE_RETRY_MAX_ATTEMPTS", "not-a-number");

        let config = MonitorConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("/tmp/test-monitor.db"));
        assert_eq!(config.correlation_window_seconds, 7200);
        assert_eq!(config.store_retry_max_attempts, 5);

        std::env::remove_var("MONITOR_DB_PATH");
        std::env::remove_var("MONITOR_CORRELATION_WINDOW_SECONDS");
        std::env::remove_var("MONITOR_STORE_RETRY_MAX_ATTEMPTS");
    }
}
