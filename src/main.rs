//! Crop Disease Detection CLI
//!
//! Runs the detection pipeline on local image files and inspects the label
//! catalog and treatment table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use crop_disease::backend::backend_name;
use crop_disease::config::{ClassifierConfig, DetectorConfig};
use crop_disease::inference::{build_classifier, DetectionService, PredictionResult};
use crop_disease::utils::logging::{init_logging, LogConfig};
use crop_disease::{ClassifierMode, LabelCatalog, TreatmentResolver};

/// Crop disease detection from leaf photos
#[derive(Parser, Debug)]
#[command(name = "crop_disease")]
#[command(version)]
#[command(about = "Detect crop diseases in leaf images and suggest treatments", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect the disease in one image (or every image in a directory)
    Detect {
        /// Image file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Detector configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model record; overrides the configuration file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Use the stand-in classifier (random predictions)
        #[arg(long, default_value = "false")]
        stand_in: bool,

        /// Seed for reproducible stand-in predictions
        #[arg(long)]
        seed: Option<u64>,

        /// Print results as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List the class labels
    Labels {
        /// Print the distinct crops instead of every label
        #[arg(long, default_value = "false")]
        crops: bool,

        /// Print raw class names (`Crop___Disease`) as the classifier emits them
        #[arg(long, default_value = "false")]
        raw: bool,
    },

    /// Look up the treatment for a crop/disease pair
    Treatment {
        #[arg(long)]
        crop: String,

        #[arg(long)]
        disease: String,

        /// Treat the label as healthy
        #[arg(long, default_value = "false")]
        healthy: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Detect {
            input,
            config,
            model,
            stand_in,
            seed,
            json,
        } => {
            let mut detector = match config {
                Some(path) => DetectorConfig::from_toml_file(&path)?,
                None => DetectorConfig::default(),
            };
            apply_overrides(&mut detector.classifier, model, stand_in, seed);
            cmd_detect(&input, &detector, json)?;
        }
        Commands::Labels { crops, raw } => cmd_labels(crops, raw),
        Commands::Treatment {
            crop,
            disease,
            healthy,
        } => cmd_treatment(&crop, &disease, healthy)?,
    }

    Ok(())
}

fn apply_overrides(
    classifier: &mut ClassifierConfig,
    model: Option<PathBuf>,
    stand_in: bool,
    seed: Option<u64>,
) {
    if let Some(path) = model {
        classifier.mode = ClassifierMode::Model;
        classifier.model_path = path;
    }
    if stand_in {
        classifier.mode = ClassifierMode::StandIn;
    }
    if seed.is_some() {
        classifier.stand_in_seed = seed;
    }
}

fn cmd_detect(input: &Path, config: &DetectorConfig, json: bool) -> Result<()> {
    let handle = build_classifier(&config.classifier)?;
    let service = DetectionService::with_builtin_tables(handle)?;
    let status = service.classifier_status();

    info!(
        input = %input.display(),
        active = %status.active,
        backend = backend_name(),
        "Running detection"
    );

    if !json {
        println!("{}", "Detection Configuration:".cyan().bold());
        println!("  Input:      {}", input.display());
        println!("  Classifier: {}", status.active);
        println!("  Backend:    {}", status.backend);
        if status.degraded {
            println!(
                "  {} predictions come from the stand-in classifier and are random",
                "DEGRADED:".yellow().bold()
            );
        }
        println!();
    }

    let files = collect_images(input)?;
    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        let raw = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        results.push((file.clone(), service.detect(&raw)));
    }

    if json {
        let payload: Vec<_> = results
            .iter()
            .map(|(path, result)| {
                serde_json::json!({
                    "path": path,
                    "detection": result,
                    "degraded": status.degraded,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (path, result) in &results {
            print_result(path, result);
        }
    }

    Ok(())
}

fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        anyhow::bail!("Input path not found: {}", input.display());
    }
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| {
                    ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"]
                        .contains(&e.to_lowercase().as_str())
                })
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn print_result(path: &Path, result: &PredictionResult) {
    println!("{}", path.display().to_string().bold());
    if result.is_failure() {
        println!("  {} {}", "Failed:".red().bold(), result.treatment);
        println!();
        return;
    }

    let status = if result.is_healthy {
        "healthy".green()
    } else {
        "diseased".red()
    };
    println!("  Crop:       {}", result.crop);
    println!("  Disease:    {} ({})", result.disease, status);
    println!("  Confidence: {:.1}%", result.confidence * 100.0);
    println!("  Class:      {}", result.class_index);
    println!("  Treatment:  {}", result.treatment);
    println!();
}

fn cmd_labels(crops: bool, raw: bool) {
    let catalog = LabelCatalog::plant_village();
    let crop_names = catalog.crops();

    if crops {
        println!("{}", format!("{} crops", crop_names.len()).cyan().bold());
        for crop in crop_names {
            println!("  {}", crop);
        }
        return;
    }

    println!(
        "{}",
        format!("{} class labels, {} crops", catalog.len(), crop_names.len())
            .cyan()
            .bold()
    );
    for label in catalog.labels() {
        if raw {
            println!("  {:>2}  {}", label.index, label.class_name());
            continue;
        }

        let marker = if label.is_healthy {
            "healthy".green()
        } else {
            "".normal()
        };
        println!("  {:>2}  {:<14} {:<40} {}", label.index, label.crop, label.disease, marker);
    }
}

fn cmd_treatment(crop: &str, disease: &str, healthy: bool) -> Result<()> {
    let resolver = TreatmentResolver::builtin()?;
    println!("{}", resolver.resolve(crop, disease, healthy));
    Ok(())
}
