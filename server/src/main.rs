//! Crop Disease Detection Server
//!
//! HTTP API around the detection core: image upload and detection,
//! per-user history, label listing and health reporting.

mod error;
mod history;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crop_disease::utils::logging::{init_logging, LogConfig};
use crop_disease::{build_classifier, ClassifierMode, DetectionService};

use crate::state::{AppState, ServerConfig};

/// Crop Disease Detection Server
#[derive(Parser, Debug)]
#[command(name = "crop-disease-server")]
#[command(version)]
#[command(about = "HTTP API server for crop disease detection")]
struct Cli {
    /// Server configuration file (TOML)
    #[arg(short, long, env = "CROP_DISEASE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CROP_DISEASE_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "CROP_DISEASE_HOST")]
    host: Option<String>,

    /// Model record path
    #[arg(long, env = "CROP_DISEASE_MODEL")]
    model: Option<PathBuf>,

    /// Serve random predictions from the stand-in classifier
    #[arg(long, env = "CROP_DISEASE_STAND_IN", default_value = "false")]
    stand_in: bool,

    /// Refuse to start when the model cannot be loaded
    #[arg(long, default_value = "false")]
    no_fallback: bool,

    /// Detection deadline in milliseconds
    #[arg(long, env = "CROP_DISEASE_DETECT_TIMEOUT_MS")]
    detect_timeout_ms: Option<u64>,

    /// Detections allowed to run at once
    #[arg(long, env = "CROP_DISEASE_MAX_CONCURRENT_DETECTIONS")]
    max_concurrent_detections: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_toml_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(timeout) = self.detect_timeout_ms {
            config.detect_timeout_ms = timeout;
        }
        if let Some(limit) = self.max_concurrent_detections {
            config.max_concurrent_detections = limit;
        }

        let classifier = &mut config.detector.classifier;
        if let Some(model) = self.model {
            classifier.mode = ClassifierMode::Model;
            classifier.model_path = model;
        }
        if self.stand_in {
            classifier.mode = ClassifierMode::StandIn;
        }
        if self.no_fallback {
            classifier.fallback_to_stand_in = false;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let config = cli.into_config()?;

    let log_config = if verbose {
        LogConfig {
            format: config.logging.format,
            ..LogConfig::verbose()
        }
    } else {
        config.logging.clone()
    };
    let _ = init_logging(&log_config);

    info!("Crop Disease Detection Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Classifier:     {}", config.detector.classifier.mode);
    info!("  Model path:     {:?}", config.detector.classifier.model_path);
    info!("  Detect timeout: {} ms", config.detect_timeout_ms);
    info!("  Body limit:     {} bytes", config.max_body_bytes);
    info!("  Concurrency:    {} detections", config.max_concurrent_detections);
    info!(
        "  History:        {} records/user, {} users",
        config.history.max_records_per_user, config.history.max_users
    );

    let handle = build_classifier(&config.detector.classifier)?;
    if handle.status.degraded {
        warn!("Serving DEGRADED predictions from the stand-in classifier");
    }
    let detector = DetectionService::with_builtin_tables(handle)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = Arc::new(AppState::new(config, detector));
    let app = routes::router(state);

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
