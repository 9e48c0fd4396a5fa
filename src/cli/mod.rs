//! tripfare CLI Module
//!
//! Command-line interface for training, feature extraction and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::preprocessing::{extract, ColumnSelection};
use crate::tracking::tracker_from_env;
use crate::training::{
    PipelineConfig, TrainedModel, Trainer, DEFAULT_DATA_PATH, DEFAULT_METRICS_PATH,
    DEFAULT_MODEL_PATH, DEFAULT_PARAMS_PATH,
};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tripfare")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch trip-fare regression pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model and write the model and metrics artifacts
    Train {
        /// Input dataset (CSV, TSV, JSON, JSONL or Parquet)
        #[arg(default_value = DEFAULT_DATA_PATH)]
        input_path: PathBuf,

        /// Model artifact to write
        #[arg(default_value = DEFAULT_MODEL_PATH)]
        model_output: PathBuf,

        /// Metrics document to write
        #[arg(default_value = DEFAULT_METRICS_PATH)]
        metrics_output: PathBuf,

        /// YAML parameter file with a `train` section
        #[arg(long, default_value = DEFAULT_PARAMS_PATH)]
        params_path: PathBuf,

        /// Pick the target by name preference and use every other column as a feature
        #[arg(long)]
        heuristic_target: bool,
    },

    /// Keep the numeric columns and complete rows of a dataset
    Extract {
        /// Input dataset
        input_path: PathBuf,

        /// Output dataset, format chosen by extension
        output_path: PathBuf,
    },

    /// Score a dataset with a saved model
    Predict {
        /// Model artifact written by `train`
        model_path: PathBuf,

        /// Dataset carrying the model's feature columns
        input_path: PathBuf,

        /// Output dataset with an added `prediction` column
        output_path: PathBuf,
    },
}

pub fn cmd_train(
    input_path: &Path,
    model_output: &Path,
    metrics_output: &Path,
    params_path: &Path,
    heuristic_target: bool,
) -> anyhow::Result<()> {
    section("Train");

    let selection = if heuristic_target {
        ColumnSelection::Heuristic
    } else {
        ColumnSelection::Explicit
    };
    let config = PipelineConfig::default()
        .with_params_path(params_path)
        .with_data_path(input_path)
        .with_model_path(model_output)
        .with_metrics_path(metrics_output)
        .with_selection(selection);

    let tracker = tracker_from_env()?;

    step_run(&format!("Training on {}", input_path.display().to_string().cyan()));
    let start = Instant::now();
    let summary = Trainer::new(config, tracker).run()?;
    step_done(&format!("{:?}", start.elapsed()));

    let metrics = &summary.metrics;
    println!();
    println!("  {:<16} {}", muted("RMSE"), format!("{:.4}", metrics.rmse).white().bold());
    kv("Model", &metrics.model_type);
    kv("Target", &metrics.target_column);
    kv("Features", &metrics.feature_columns.join(", "));
    kv("Rows", &format!("{} train / {} test", metrics.n_train, metrics.n_test));
    kv("Model file", &summary.model_path.display().to_string());
    kv("Metrics file", &summary.metrics_path.display().to_string());
    if let Some(run_id) = &summary.run_id {
        kv("Run", run_id);
    }
    println!();

    Ok(())
}

pub fn cmd_extract(input_path: &Path, output_path: &Path) -> anyhow::Result<()> {
    section("Extract");

    step_run("Extracting numeric features");
    let start = Instant::now();
    let summary = extract(input_path, output_path)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv("Rows", &format!("{} in / {} out", summary.rows_in, summary.rows_out));
    kv("Kept", &summary.columns.join(", "));
    if !summary.dropped_columns.is_empty() {
        kv("Dropped", &summary.dropped_columns.join(", "));
    }
    kv("Output", &summary.output_path.display().to_string());
    println!();

    Ok(())
}

pub fn cmd_predict(model_path: &Path, input_path: &Path, output_path: &Path) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let model = TrainedModel::load(model_path)?;
    step_done(&format!("{} on {}", model.model_type, model.feature_columns.join(", ")));

    step_run("Loading data");
    let df = DataLoader::new().load_auto(input_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Predicting");
    let predictions = model.predict(&df)?;
    let mut out = df.select(model.feature_columns.iter().map(String::as_str))?;
    out.with_column(Column::new("prediction".into(), predictions.to_vec()))?;
    DataSaver::save_auto(&mut out, output_path)?;
    step_done(&output_path.display().to_string());
    println!();

    Ok(())
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Train {
            input_path,
            model_output,
            metrics_output,
            params_path,
            heuristic_target,
        } => cmd_train(
            &input_path,
            &model_output,
            &metrics_output,
            &params_path,
            heuristic_target,
        ),
        Commands::Extract {
            input_path,
            output_path,
        } => cmd_extract(&input_path, &output_path),
        Commands::Predict {
            model_path,
            input_path,
            output_path,
        } => cmd_predict(&model_path, &input_path, &output_path),
    }
}
