/// Runtime configuration for talking to the console backend.
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub base_url: String,
    /// Delay between job status polls.
    pub refresh_interval_ms: u64,
    /// Consecutive transport errors tolerated before polling is abandoned.
    pub max_retries: u32,
    /// Timeout for status/cancel requests. Save and workspace-clean have none.
    pub status_timeout_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            refresh_interval_ms: 1000,
            max_retries: 8,
            status_timeout_ms: 10000,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: std::env::var("PROCTOR_BASE_URL").unwrap_or(d.base_url),
            refresh_interval_ms: std::env::var("JOB_REFRESH_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.refresh_interval_ms),
            max_retries: std::env::var("JOB_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_retries),
            status_timeout_ms: std::env::var("JOB_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.status_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_poller_contract() {
        let cfg = ConsoleConfig::default();
        assert_eq!(cfg.refresh_interval_ms, 1000);
        assert_eq!(cfg.max_retries, 8);
        assert_eq!(cfg.status_timeout_ms, 10000);
    }
}
