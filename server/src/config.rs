use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

/// Capture parameters served to the student client. 2 frames/sec at 640x480
/// and quality 0.6 keeps a frame around 15-25KB.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureConfig {
    pub interval_ms: u64,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            width: 640,
            height: 480,
            jpeg_quality: 0.6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Origin of the monitoring dashboard, for CORS.
    pub cors_origin: String,
    pub idle_sweep_period: Duration,
    /// Sessions with no producer activity for longer than this are evicted
    /// by the sweep.
    pub idle_timeout_seconds: f64,
    /// Upper bound for one landmark inference call.
    pub provider_timeout: Duration,
    /// Registry capacity. A connection that would create a session beyond
    /// this is rejected.
    pub max_sessions: usize,
    pub capture: CaptureConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            idle_sweep_period: Duration::from_secs(30),
            idle_timeout_seconds: 300.0,
            provider_timeout: Duration::from_secs(10),
            max_sessions: 256,
            capture: CaptureConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = env::var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(origin) = env::var("CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        if let Some(secs) = parse_env::<u64>("IDLE_SWEEP_SECS") {
            config.idle_sweep_period = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_env::<f64>("IDLE_TIMEOUT_SECS") {
            config.idle_timeout_seconds = secs;
        }
        if let Some(secs) = parse_env::<u64>("PROVIDER_TIMEOUT_SECS") {
            config.provider_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(count) = parse_env::<usize>("MAX_SESSIONS") {
            config.max_sessions = count.max(1);
        }
        config
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring unparsable {}={}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_capture_cadence() {
        let config = ServerConfig::default();
        assert_eq!(config.capture.interval_ms, 500);
        assert_eq!((config.capture.width, config.capture.height), (640, 480));
        assert!(config.idle_timeout_seconds > config.idle_sweep_period.as_secs() as f64);
    }

    #[test]
    fn env_overrides_apply_and_garbage_is_ignored() {
        env::set_var("IDLE_TIMEOUT_SECS", "120");
        env::set_var("IDLE_SWEEP_SECS", "not-a-number");
        let config = ServerConfig::from_env();
        assert_eq!(config.idle_timeout_seconds, 120.0);
        assert_eq!(config.idle_sweep_period, Duration::from_secs(30));
        env::remove_var("IDLE_TIMEOUT_SECS");
        env::remove_var("IDLE_SWEEP_SECS");
    }
}
