mod config;
mod data;
mod error;
mod ml;
mod types;
mod web;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::AppConfig;
use error::TrendError;
use ml::{ArtifactStore, FeatureVector, PredictionInput, TrendPredictor};
use web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "trend-classifier")]
#[command(version = "0.1.0")]
#[command(about = "Market trend classifier: train and serve Bearish/Stable/Bullish predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "trend.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from a labeled CSV and persist the artifact
    Train {
        /// Training data CSV path
        #[arg(short, long)]
        data: PathBuf,

        /// Override the configured artifact directory
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Override the configured split/bagging seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Override the configured tree count
        #[arg(short, long)]
        trees: Option<usize>,

        /// Override the configured held-out test fraction
        #[arg(long)]
        split: Option<f64>,
    },
    /// Interactively predict trends from a persisted artifact
    Predict {
        /// Override the configured artifact directory
        #[arg(short, long)]
        artifacts: Option<PathBuf>,
    },
    /// Run one prediction on a fixed reference input
    SelfTest {
        /// Override the configured artifact directory
        #[arg(short, long)]
        artifacts: Option<PathBuf>,
    },
    /// Print a textual summary of a dataset
    Analyze {
        /// Dataset CSV path
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Serve the prediction form and JSON API
    Serve {
        /// Override the configured artifact directory
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Server port
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::load(Path::new(&cli.config))?;

    match cli.command {
        Commands::Train {
            data,
            artifacts,
            seed,
            trees,
            split,
        } => run_train(&config, &data, artifacts, seed, trees, split)?,
        Commands::Predict { artifacts } => run_predict(&config, artifacts)?,
        Commands::SelfTest { artifacts } => run_self_test(&config, artifacts)?,
        Commands::Analyze { data } => run_analyze(&data)?,
        Commands::Serve { artifacts, port } => run_serve(&config, artifacts, port).await?,
    }

    Ok(())
}

fn store_for(config: &AppConfig, artifacts: Option<PathBuf>) -> ArtifactStore {
    ArtifactStore::new(artifacts.unwrap_or_else(|| config.artifacts_dir.clone()))
}

fn run_train(
    config: &AppConfig,
    data: &Path,
    artifacts: Option<PathBuf>,
    seed: Option<u64>,
    trees: Option<usize>,
    split: Option<f64>,
) -> Result<()> {
    let mut settings = config.training.clone();
    if let Some(seed) = seed {
        settings.seed = seed;
    }
    if let Some(trees) = trees {
        settings.n_trees = trees;
    }
    if let Some(split) = split {
        if !(split > 0.0 && split < 1.0) {
            return Err(TrendError::InputValidation(format!(
                "test fraction must be in (0, 1), got {split}"
            ))
            .into());
        }
        settings.test_fraction = split;
    }

    let records = data::load_records(data)?;
    let set = ml::build_training_set(&records)?;
    info!(
        used = set.report.used,
        short_history = set.report.excluded_short_history,
        bad_label = set.report.excluded_bad_label,
        non_finite = set.report.excluded_non_finite,
        "featurized dataset"
    );

    let (artifact, report) = ml::train(&set, &settings)?;

    println!("\nModel Performance");
    println!("{}", "-".repeat(50));
    println!("{}", report);

    let store = store_for(config, artifacts);
    store.save(&artifact)?;
    info!(dir = %store.dir().display(), "model and scaler saved");

    Ok(())
}

fn run_predict(config: &AppConfig, artifacts: Option<PathBuf>) -> Result<()> {
    let store = store_for(config, artifacts);
    let artifact = store.load()?;
    let predictor = TrendPredictor::new(std::sync::Arc::new(artifact));

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!("\nPredict Market Trend");
        println!("{}", "-".repeat(50));

        if let Some(input) = read_prediction_input(&mut lines)? {
            let vector = FeatureVector::from_external(&input);
            let prediction = predictor.predict(&vector)?;
            print_prediction(&prediction);
        }

        print!("\nTry another prediction? (yes/no): ");
        std::io::stdout().flush()?;
        match lines.next() {
            Some(line) => {
                if !line?.trim().eq_ignore_ascii_case("yes") {
                    break;
                }
            }
            None => break,
        }
    }

    Ok(())
}

fn run_self_test(config: &AppConfig, artifacts: Option<PathBuf>) -> Result<()> {
    let store = store_for(config, artifacts);
    let artifact = store.load()?;
    let predictor = TrendPredictor::new(std::sync::Arc::new(artifact));

    let input = PredictionInput {
        open: 100.0,
        high: 102.0,
        low: 99.0,
        close: 101.0,
        volume: 150_000.0,
        market_cap: 5_000_000_000.0,
        pe_ratio: 20.0,
        dividend_yield: 2.5,
        volatility: 0.02,
        sentiment_score: 0.5,
        ma5: 100.5,
        ma20: 100.2,
    };

    let prediction = predictor.predict(&FeatureVector::from_external(&input))?;
    print_prediction(&prediction);
    Ok(())
}

fn run_analyze(data: &Path) -> Result<()> {
    let records = data::load_records(data)?;
    let summary = data::DatasetSummary::from_records(&records);

    println!("\nData Analysis");
    println!("{}", "-".repeat(50));
    print!("{}", summary);

    match ml::build_training_set(&records) {
        Ok(set) => {
            println!("Usable for training: {}", set.report.used);
            println!(
                "Excluded (short history / bad label / non-finite): {} / {} / {}",
                set.report.excluded_short_history,
                set.report.excluded_bad_label,
                set.report.excluded_non_finite
            );
        }
        Err(e) => println!("Not trainable as-is: {}", e),
    }

    Ok(())
}

async fn run_serve(config: &AppConfig, artifacts: Option<PathBuf>, port: u16) -> Result<()> {
    let store = store_for(config, artifacts);
    let artifact = store.load()?;
    info!(
        trained_at = %artifact.metadata.trained_at,
        accuracy = artifact.metadata.accuracy,
        "serving model"
    );

    let state = AppState::new(artifact, store);
    start_server(state, port).await
}

type StdinLines<'a> = std::io::Lines<std::io::StdinLock<'a>>;

/// Prompt for the 12 external fields. Returns None (after a message) on
/// the first non-numeric entry, mirroring a single retry-able pass.
fn read_prediction_input(lines: &mut StdinLines<'_>) -> Result<Option<PredictionInput>> {
    println!("Enter the following market data:");

    let mut values = [0.0f64; 12];
    let prompts = [
        "Opening Price",
        "High Price",
        "Low Price",
        "Closing Price",
        "Volume",
        "Market Cap",
        "PE Ratio",
        "Dividend Yield",
        "Volatility",
        "Sentiment Score (-1 to 1)",
        "5-day Moving Average",
        "20-day Moving Average",
    ];

    for (value, prompt) in values.iter_mut().zip(prompts) {
        print!("{}: ", prompt);
        std::io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(None),
        };
        match line.trim().parse::<f64>() {
            Ok(v) => *value = v,
            Err(_) => {
                println!("Please enter valid numerical values.");
                return Ok(None);
            }
        }
    }

    let [open, high, low, close, volume, market_cap, pe_ratio, dividend_yield, volatility, sentiment_score, ma5, ma20] =
        values;
    Ok(Some(PredictionInput {
        open,
        high,
        low,
        close,
        volume,
        market_cap,
        pe_ratio,
        dividend_yield,
        volatility,
        sentiment_score,
        ma5,
        ma20,
    }))
}

fn print_prediction(prediction: &ml::Prediction) {
    println!("\nPrediction Results");
    println!("{}", "-".repeat(50));
    println!("Predicted Trend: {}", prediction.trend);
    println!("Prediction Probabilities:");
    println!("  Bearish: {:.2}", prediction.probabilities.bearish);
    println!("  Stable:  {:.2}", prediction.probabilities.stable);
    println!("  Bullish: {:.2}", prediction.probabilities.bullish);
}
