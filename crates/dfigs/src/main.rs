//! Phased FIGS CLI
//!
//! Fits an ensemble on a CSV dataset, then for each phase file adds the
//! phase and extends the ensemble with extra rules.

use anyhow::{Context, Result};
use clap::Parser;
use dfigs::{Dataset, FigsConfig, FigsEnsemble};
use ndarray::{concatenate, Axis};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "dfigs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fit and extend phased sums of trees", long_about = None)]
struct Args {
    /// Input CSV dataset (last column is target)
    #[arg(short, long)]
    input: PathBuf,

    /// Phase CSV files, applied in order (same rows as the input, no target column)
    #[arg(long = "phase")]
    phases: Vec<PathBuf>,

    /// Extra rules granted after each phase
    #[arg(long, default_value = "5")]
    extend_rules: usize,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured rule budget
    #[arg(long)]
    max_rules: Option<usize>,

    /// Output directory for model and hash
    #[arg(short, long, default_value = "models/dfigs")]
    output: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("dfigs v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => FigsConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FigsConfig::default(),
    };
    if let Some(max_rules) = args.max_rules {
        config.max_rules = max_rules;
    }

    info!("Loading dataset from: {}", args.input.display());
    let dataset = Dataset::from_csv(&args.input).context("Failed to load dataset")?;
    info!(
        "Loaded {} samples with {} features",
        dataset.len(),
        dataset.feature_count()
    );
    for (i, (min, max, missing)) in dataset.feature_stats().iter().enumerate() {
        info!("  Feature {}: min={}, max={}, missing={}", i, min, max, missing);
    }

    let mut ensemble = FigsEnsemble::new(config)?;
    ensemble.fit(dataset.features.view(), &dataset.targets)?;
    info!(
        "Initial fit: {} trees, {} rules",
        ensemble.trees().len(),
        ensemble.complexity()
    );

    let mut features = dataset.features.clone();
    for path in &args.phases {
        info!("Adding phase from: {}", path.display());
        let phase = Dataset::phase_from_csv(path)
            .with_context(|| format!("Failed to load phase {}", path.display()))?;
        ensemble.add_new_phase(phase.view())?;
        features = concatenate(Axis(1), &[features.view(), phase.view()])
            .context("Phase rows do not match the dataset")?;
        ensemble.extend_trees(features.view(), &dataset.targets, args.extend_rules)?;
        info!(
            "After phase: {} trees, {} rules (budget {})",
            ensemble.trees().len(),
            ensemble.complexity(),
            ensemble.max_rules()
        );
    }

    std::fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    let model_path = args.output.join("model.json");
    info!("Saving model to: {}", model_path.display());
    let json = serde_json::to_string_pretty(&ensemble.to_model())
        .context("Failed to serialize model")?;
    std::fs::write(&model_path, &json).context("Failed to write model file")?;

    let hash_hex = hex::encode(blake3::hash(json.as_bytes()).as_bytes());
    let hash_path = args.output.join("model.hash");
    std::fs::write(&hash_path, &hash_hex).context("Failed to write hash file")?;

    info!("Model: {} ({})", model_path.display(), hash_hex);
    Ok(())
}
