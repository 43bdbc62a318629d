//! Demand forecast CLI module
//!
//! Command-line interface for preparing training partitions and checking
//! configuration.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::data::{load_csv, SourceTables};
use crate::features::{to_dataframe, FeatureRow};
use crate::pipeline::{Pipeline, PipelineOutput};
use crate::preprocessing::{validate_window_sizes, WindowSpec};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 180, 80) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

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

// ─── CLI definition ────────────────────────────────────────────────────────────

/// Output file format for feature partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Parser)]
#[command(name = "demand-forecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Monthly demand feature engineering and temporal partitioning")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build train / validation / test feature partitions
    Prepare {
        /// Daily sales transactions (CSV)
        #[arg(long)]
        sales: PathBuf,

        /// Item → category table (CSV)
        #[arg(long)]
        items: PathBuf,

        /// Store table (CSV)
        #[arg(long)]
        stores: PathBuf,

        /// Category table (CSV)
        #[arg(long)]
        categories: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Rolling window sizes, comma separated (overrides the config)
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<f64>>,

        /// Oversample the training partition (overrides the config)
        #[arg(long)]
        balance: bool,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Output file format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Check a rolling window list and print the normalised pair
    ValidateWindows {
        /// Window sizes, comma separated
        #[arg(value_delimiter = ',', allow_negative_numbers = true)]
        windows: Vec<f64>,
    },

    /// Show sales table information
    Info {
        /// Daily sales transactions (CSV)
        #[arg(long)]
        sales: PathBuf,
    },
}

// ─── Output ────────────────────────────────────────────────────────────────────

/// Write a DataFrame as CSV or Parquet
pub fn write_frame(df: &mut DataFrame, path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let file = File::create(path)?;
    match format {
        OutputFormat::Csv => CsvWriter::new(file).include_header(true).finish(df)?,
        OutputFormat::Parquet => {
            ParquetWriter::new(file).finish(df)?;
        }
    }
    Ok(())
}

fn write_rows(rows: &[FeatureRow], windows: &WindowSpec, path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let mut df = to_dataframe(rows, windows)?;
    write_frame(&mut df, path, format)
}

/// Balanced training matrix: one column per feature plus `target_log`
fn balanced_frame(output: &PipelineOutput) -> anyhow::Result<DataFrame> {
    let mut columns: Vec<Column> = output
        .feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| Series::new(name.as_str().into(), output.train.x.column(j).to_vec()).into())
        .collect();
    columns.push(Series::new("target_log".into(), output.train.y.to_vec()).into());
    Ok(DataFrame::new(columns)?)
}

/// Write every artifact of a pipeline run into `dir`
pub fn write_outputs(output: &PipelineOutput, dir: &Path, format: OutputFormat) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let ext = format.extension();
    let mut written = Vec::new();

    for (name, rows) in [
        ("train", output.split.train()),
        ("val", output.split.val()),
        ("test", output.split.test()),
    ] {
        let path = dir.join(format!("{}.{}", name, ext));
        write_rows(rows, &output.windows, &path, format)?;
        written.push(path);
    }

    if output.train.applied {
        let path = dir.join(format!("train_balanced.{}", ext));
        write_frame(&mut balanced_frame(output)?, &path, format)?;
        written.push(path);
    }

    let segments_path = dir.join("segments.json");
    std::fs::write(&segments_path, serde_json::to_string_pretty(&output.segments)?)?;
    written.push(segments_path);

    let pricing_path = dir.join("category_prices.json");
    std::fs::write(&pricing_path, serde_json::to_string_pretty(&output.pricing)?)?;
    written.push(pricing_path);

    Ok(written)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_prepare(
    sales: &Path,
    items: &Path,
    stores: &Path,
    categories: &Path,
    config_path: Option<&Path>,
    windows: Option<Vec<f64>>,
    balance: bool,
    output_dir: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    section("Prepare");

    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(windows) = windows {
        config = config.with_rolling_windows(windows);
    }
    if balance {
        config = config.with_balancing(true);
    }
    // Configuration errors surface before any file is read
    let pipeline = Pipeline::new(config)?;

    step_run("Loading source tables");
    let start = Instant::now();
    let tables = SourceTables::from_csv_files(sales, items, stores, categories)?;
    step_done(&format!(
        "{} transactions, {} items, {} stores in {:?}",
        tables.transactions.len(),
        tables.items.len(),
        tables.stores.len(),
        start.elapsed()
    ));

    step_run("Building features");
    let start = Instant::now();
    let output = pipeline.run(&tables)?;
    step_done(&format!("{} rows in {:?}", output.split.rows().len(), start.elapsed()));

    let bounds = output.split.month_bounds();
    let fmt_range = |r: Option<(i64, i64)>| match r {
        Some((a, b)) if a == b => format!("month {}", a),
        Some((a, b)) => format!("months {}–{}", a, b),
        None => "empty".to_string(),
    };
    println!("  {:<12} {} rows, {}", muted("Train"), output.split.train().len(), fmt_range(bounds.train));
    println!("  {:<12} {} rows, {}", muted("Validation"), output.split.val().len(), fmt_range(bounds.val));
    println!("  {:<12} {} rows, {}", muted("Test"), output.split.test().len(), fmt_range(bounds.test));
    println!("  {:<12} {}", muted("Windows"), output.windows);
    println!("  {:<12} {}", muted("Segments"), output.segments.n_segments());

    if !output.split.has_validation() {
        println!(
            "  {} {}",
            warn("!"),
            "validation partition is empty, use a random hold-out of train".yellow()
        );
    }
    if output.train.applied {
        step_ok(&format!("{} synthetic training rows", output.train.n_synthetic));
    }

    for path in write_outputs(&output, output_dir, format)? {
        step_ok(&format!("wrote {}", path.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_validate_windows(windows: &[f64]) -> anyhow::Result<()> {
    let spec = validate_window_sizes(windows)?;
    println!("  {} rolling windows {}", ok("✓"), spec.to_string().white().bold());
    Ok(())
}

pub fn cmd_info(sales: &Path) -> anyhow::Result<()> {
    section("Sales Info");

    let df = load_csv(sales)?;

    println!("  {:<12} {}", muted("File"), sales.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6} {:>8}", muted("Column"), muted("Type"), muted("Nulls"), muted("Unique"));
    println!("  {}", dim(&"─".repeat(50)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    let records = crate::data::transactions_from_frame(&df)?;
    if let (Some(first), Some(last)) = (
        records.iter().map(|r| r.month_index).min(),
        records.iter().map(|r| r.month_index).max(),
    ) {
        println!();
        println!("  {:<12} {}–{}", muted("Months"), first, last);
    }

    println!();
    Ok(())
}
