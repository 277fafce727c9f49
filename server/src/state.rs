//! Application state for the detection server
//!
//! Holds the detection service (built once at startup), the in-memory
//! detection history and the server configuration.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crop_disease::utils::logging::LogConfig;
use crop_disease::{DetectionService, DetectorConfig};

use crate::history::{DetectionHistory, HistoryLimits};

/// Default upload cap: 10 MiB
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default deadline for one detection
pub const DEFAULT_DETECT_TIMEOUT_MS: u64 = 30_000;

/// Default number of detections allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_DETECTIONS: usize = 4;

/// Server configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for a single detection; the failure result is returned past it
    pub detect_timeout_ms: u64,
    /// Maximum request body size
    pub max_body_bytes: usize,
    /// Detections running at once; further requests wait within their deadline
    pub max_concurrent_detections: usize,
    pub history: HistoryLimits,
    /// Detection core configuration
    pub detector: DetectorConfig,
    pub logging: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            detect_timeout_ms: DEFAULT_DETECT_TIMEOUT_MS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_concurrent_detections: DEFAULT_MAX_CONCURRENT_DETECTIONS,
            history: HistoryLimits::default(),
            detector: DetectorConfig::default(),
            logging: LogConfig::server(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }
}

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub detector: DetectionService,
    pub history: DetectionHistory,
    /// Gate on in-flight detections, held until the blocking work returns
    pub detect_permits: Arc<Semaphore>,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, detector: DetectionService) -> Self {
        let permits = config.max_concurrent_detections.max(1);
        Self {
            history: DetectionHistory::with_limits(config.history),
            detect_permits: Arc::new(Semaphore::new(permits)),
            config,
            detector,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;
    use crop_disease::utils::logging::{LogFormat, LogLevel};
    use crop_disease::inference::StandInClassifier;
    use crop_disease::{ClassifierHandle, ClassifierMode};

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.detect_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_detections, 4);
        assert_eq!(config.history, HistoryLimits::default());
    }

    #[test]
    fn test_detect_permits_follow_config() {
        let detector = DetectionService::with_builtin_tables(ClassifierHandle::new(Arc::new(
            StandInClassifier::seeded(7),
        )))
        .unwrap();

        let config = ServerConfig {
            max_concurrent_detections: 2,
            ..ServerConfig::default()
        };
        let state = AppState::new(config, detector.clone());
        assert_eq!(state.detect_permits.available_permits(), 2);

        let config = ServerConfig {
            max_concurrent_detections: 0,
            ..ServerConfig::default()
        };
        let state = AppState::new(config, detector);
        assert_eq!(state.detect_permits.available_permits(), 1);
    }

    #[test]
    fn test_parse_nested_detector_section() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 9000
            detect_timeout_ms = 500
            max_concurrent_detections = 8

            [history]
            max_records_per_user = 25

            [detector.classifier]
            mode = "stand_in"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.detect_timeout_ms, 500);
        assert_eq!(config.max_concurrent_detections, 8);
        assert_eq!(config.history.max_records_per_user, 25);
        assert_eq!(config.history.max_users, 10_000);
        assert_eq!(config.detector.classifier.mode, ClassifierMode::StandIn);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "host = \"127.0.0.1\"\n").unwrap();

        let config = ServerConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert!(ServerConfig::from_toml_file(&dir.path().join("nope.toml")).is_err());
    }
}
