//! Rolling-origin evaluation CLI.
//!
//! # List the splits a panel supports
//! dspt-backtest splits --data data/processed/returns.parquet
//!
//! # Naive and seasonal-naive baselines
//! dspt-backtest baselines --data data/processed/returns.parquet --seasonality 5
//!
//! # Baseline errors split by volatility regime
//! dspt-backtest regimes --config config/eval.toml --data data/processed/features_v1.parquet
//!
//! # Write the evaluation protocol
//! dspt-backtest protocol --data data/processed/returns.parquet --universe data/static/universe_2024.csv
//!
//! `splits` and `baselines` default to 252/63/63 windows; `regimes` and
//! `protocol` default to 80/21/21. Both use a 5-day embargo.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use dspt_backtest::data::derive_volatility_feature;
use dspt_backtest::report::DEFAULT_REGIME_SPLIT_PATTERN;
use dspt_backtest::{
    EvalConfig, EvalProtocol, NaiveForecaster, Panel, PanelLoader, RegimeEvaluator, ReportWriter,
    RollingOriginConfig, RollingOriginSplits, SeasonalNaiveForecaster, WalkForwardEvaluator,
};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "dspt-backtest")]
#[command(about = "Leakage-aware rolling-origin evaluation of forecasting baselines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rolling-origin splits of the panel's calendar
    Splits {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Evaluate naive and seasonal-naive baselines on every split
    Baselines {
        #[command(flatten)]
        common: CommonArgs,

        /// Summary CSV file name inside the output directory
        #[arg(long, default_value = "baselines_rollingorigin_summary.csv")]
        out_summary: String,
    },

    /// Evaluate baselines separately per volatility regime (windows default to 80/21/21)
    Regimes {
        #[command(flatten)]
        common: CommonArgs,

        /// Volatility column used for regime labels
        #[arg(long)]
        vol_col: Option<String>,

        #[arg(long, default_value = "regime_summary.csv")]
        out_summary: String,

        #[arg(long, default_value = "regime_thresholds.json")]
        out_thresholds: String,
    },

    /// Write the evaluation protocol Markdown (windows default to 80/21/21)
    Protocol {
        #[command(flatten)]
        common: CommonArgs,

        /// Static universe CSV; its row count is reported as the ticker count
        #[arg(long)]
        universe: Option<PathBuf>,

        #[arg(long, default_value = "eval_protocol.md")]
        out: String,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Panel file (.parquet or .csv)
    #[arg(short, long)]
    data: PathBuf,

    /// Output directory for report files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum training dates [default: 252, or 80 for regimes/protocol]
    #[arg(long)]
    train_min: Option<usize>,

    /// Validation dates per split [default: 63, or 21 for regimes/protocol]
    #[arg(long)]
    val_size: Option<usize>,

    /// Dates between split origins [default: 63, or 21 for regimes/protocol]
    #[arg(long)]
    step: Option<usize>,

    /// Dates dropped between training and validation [default: 5]
    #[arg(long)]
    embargo: Option<usize>,

    /// Period of the seasonal-naive baseline
    #[arg(long)]
    seasonality: Option<usize>,
}

impl CommonArgs {
    /// File config (or defaults with `default_splits`) with command-line overrides applied.
    fn resolve(&self, default_splits: RollingOriginConfig) -> Result<EvalConfig> {
        let mut config = match &self.config {
            Some(path) => EvalConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EvalConfig::with_splits(default_splits),
        };

        if let Some(v) = self.train_min {
            config.splits.train_min = v;
        }
        if let Some(v) = self.val_size {
            config.splits.val_size = v;
        }
        if let Some(v) = self.step {
            config.splits.step = v;
        }
        if let Some(v) = self.embargo {
            config.splits.embargo = v;
        }
        if let Some(v) = self.seasonality {
            config.seasonality = v;
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn load_panel(&self, config: &EvalConfig) -> Result<Panel> {
        PanelLoader::new(config.columns.clone())
            .load(&self.data)
            .with_context(|| format!("Failed to load panel from {}", self.data.display()))
    }
}

impl Commands {
    /// Split windows used when no config file is given.
    fn default_splits(&self) -> RollingOriginConfig {
        match self {
            Commands::Splits { .. } | Commands::Baselines { .. } => RollingOriginConfig::default(),
            Commands::Regimes { .. } | Commands::Protocol { .. } => RollingOriginConfig::short_history(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dspt_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let defaults = cli.command.default_splits();

    match cli.command {
        Commands::Splits { common } => cmd_splits(&common, common.resolve(defaults)?),
        Commands::Baselines { common, out_summary } => cmd_baselines(&common, common.resolve(defaults)?, &out_summary),
        Commands::Regimes {
            common,
            vol_col,
            out_summary,
            out_thresholds,
        } => cmd_regimes(&common, common.resolve(defaults)?, vol_col, &out_summary, &out_thresholds),
        Commands::Protocol { common, universe, out } => {
            cmd_protocol(&common, common.resolve(defaults)?, universe.as_deref(), &out)
        }
    }
}

fn cmd_splits(common: &CommonArgs, config: EvalConfig) -> Result<()> {
    let panel = common.load_panel(&config)?;
    let calendar = panel.calendar();
    let splits = RollingOriginSplits::new(config.splits)?.generate(&calendar);

    println!("{}", SEPARATOR);
    println!(
        "{} entities, {} dates, {} splits",
        panel.len(),
        calendar.len(),
        splits.len()
    );
    println!("{}", SEPARATOR);
    for split in &splits {
        println!(
            "  {:>3}  train {}  ({:>4} dates)  val {}  ({} dates)",
            split.split_id,
            split.train_range(),
            split.train_len(),
            split.val_range(),
            split.val_len()
        );
    }
    Ok(())
}

fn cmd_baselines(common: &CommonArgs, config: EvalConfig, out_summary: &str) -> Result<()> {
    let panel = common.load_panel(&config)?;

    let evaluator = WalkForwardEvaluator::new(config.splits)?
        .with_forecaster(NaiveForecaster)
        .with_forecaster(SeasonalNaiveForecaster::new(config.seasonality));
    let result = evaluator.evaluate(&panel);

    let writer = ReportWriter::new(&config.output_dir);
    writer
        .write_summaries(&result.summaries, out_summary)
        .context("Failed to write summary CSV")?;
    writer
        .write_entity_metrics(&result.entity_metrics, &config.per_entity_pattern)
        .context("Failed to write per-entity CSVs")?;

    println!("{}", result.summary());
    for method in ["naive".to_string(), format!("s{}", config.seasonality)] {
        println!("  avg macro MAE {:<6} {:.6}", method, result.avg_macro_mae(&method));
    }
    Ok(())
}

fn cmd_regimes(
    common: &CommonArgs,
    mut config: EvalConfig,
    vol_col: Option<String>,
    out_summary: &str,
    out_thresholds: &str,
) -> Result<()> {
    if let Some(column) = vol_col {
        config.regime.vol_column = column;
    }
    // load the volatility column when the table already has it
    if !config.columns.features.contains(&config.regime.vol_column) {
        config.columns.features.push(config.regime.vol_column.clone());
    }
    let mut panel = common.load_panel(&config)?;
    derive_volatility_feature(&mut panel, &config.regime.vol_column, config.regime.vol_window);

    let evaluator = RegimeEvaluator::new(config.splits, config.regime.clone())?
        .with_forecaster(NaiveForecaster)
        .with_forecaster(SeasonalNaiveForecaster::new(config.seasonality));
    let result = evaluator.evaluate(&panel);

    let writer = ReportWriter::new(&config.output_dir);
    writer
        .write_regime_splits(&result.summaries, DEFAULT_REGIME_SPLIT_PATTERN)
        .context("Failed to write per-split regime CSVs")?;
    writer
        .write_regime_summaries(&result.summaries, out_summary)
        .context("Failed to write regime summary CSV")?;
    writer
        .write_thresholds(&result.thresholds, out_thresholds)
        .context("Failed to write regime thresholds")?;

    println!("{}", SEPARATOR);
    println!("Average macro MAE by regime");
    println!("{}", SEPARATOR);
    for method in ["naive".to_string(), format!("s{}", config.seasonality)] {
        for (regime, mae) in result.avg_macro_mae_by_regime(&method) {
            println!("  {:<6} {:<5} {:.6}", method, regime.as_str(), mae);
        }
    }
    Ok(())
}

fn cmd_protocol(common: &CommonArgs, config: EvalConfig, universe: Option<&Path>, out: &str) -> Result<()> {
    let panel = common.load_panel(&config)?;
    let splits = RollingOriginSplits::new(config.splits)?.generate(&panel.calendar());

    let today = chrono::Local::now().date_naive();
    let mut protocol = EvalProtocol::new(today, config.splits, &splits, panel.len())
        .with_columns(&config.columns.signal, &config.columns.label);
    if let Some(path) = universe {
        let count = PanelLoader::new(config.columns.clone())
            .read_frame(path)
            .with_context(|| format!("Failed to read universe {}", path.display()))?
            .height();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        protocol = protocol.with_universe(&name, count);
    }

    let path = ReportWriter::new(&config.output_dir)
        .write_protocol(&protocol, out)
        .context("Failed to write protocol")?;
    info!("Protocol covers {} splits", splits.len());
    println!("Wrote {}", path.display());
    Ok(())
}
