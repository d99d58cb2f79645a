//! Monitoring configuration
//!
//! All options are environment-driven with sensible defaults,
//! loaded once at startup.

use std::time::Duration;

/// Monitoring pipeline configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Classification service endpoint (POST target)
    pub detection_endpoint: String,
    /// Camera snapshot URL for the HTTP frame source
    pub snapshot_url: String,
    /// Capture cadence in milliseconds
    pub capture_interval_ms: u64,
    /// Retries per attempt chain after the initial send
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
    /// Frame downscale width before transmission
    pub frame_width: u32,
    /// Frame downscale height before transmission
    pub frame_height: u32,
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
    /// Whether transitions into Warning arm the audible alarm
    pub alarm_enabled_by_default: bool,
    /// Safety timeout for a single detection request in seconds
    pub request_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            detection_endpoint: std::env::var("DETECTION_ENDPOINT")
                .unwrap_or_else(|_| "http://127.0.0.1:9000/detect".to_string()),
            snapshot_url: std::env::var("SNAPSHOT_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080/snapshot.jpg".to_string()),
            capture_interval_ms: env_parse("CAPTURE_INTERVAL_MS", 1000),
            max_retries: env_parse("MAX_RETRIES", 2),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", 1000),
            frame_width: env_parse("FRAME_WIDTH", 320),
            frame_height: env_parse("FRAME_HEIGHT", 240),
            jpeg_quality: env_parse("JPEG_QUALITY", 80),
            alarm_enabled_by_default: env_parse("ALARM_ENABLED", true),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
        }
    }
}

impl MonitorConfig {
    /// Capture cadence as a `Duration`
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    /// Backoff base delay as a `Duration`
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.capture_interval_ms, 1000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_base_delay_ms, 1000);
        assert_eq!(config.frame_width, 320);
        assert_eq!(config.frame_height, 240);
        assert_eq!(config.jpeg_quality, 80);
    }

    #[test]
    fn test_duration_helpers() {
        let config = MonitorConfig {
            capture_interval_ms: 250,
            retry_base_delay_ms: 50,
            ..MonitorConfig::default()
        };
        assert_eq!(config.capture_interval(), Duration::from_millis(250));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(50));
    }
}
