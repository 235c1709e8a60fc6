//! CLI definition and dispatch.
//!
//! Results go to stdout as JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_cache_adapter::MemoryVerdictStore;
use crate::adapters::score_adapter::StaticScoreAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::analysis::{Scorers, analyze_symbol, validate_many};
use crate::domain::config_validation::{validate_config, validate_strategy_config};
use crate::domain::decision::{DecisionConfig, Dimension};
use crate::domain::error::StratgateError;
use crate::domain::params::{DEFAULT_CACHE_TTL_DAYS, DEFAULT_HISTORY_YEARS, ValidationSettings};
use crate::domain::pattern::PatternKind;
use crate::domain::pattern::cup_handle::CupHandleParams;
use crate::domain::pattern::golden_cross::GoldenCrossParams;
use crate::domain::pattern::head_shoulders::HeadShouldersParams;
use crate::domain::simulator::{EntryFill, SimulationConfig};
use crate::domain::validator::StrategyValidator;
use crate::domain::verdict::AcceptanceCriteria;
use crate::ports::cache_port::VerdictStore;
use crate::ports::clock_port::SystemClock;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "stratgate", about = "Backtest-gated chart pattern validation")]
pub struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a strategy on symbols (all known symbols if none given)
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        symbols: Vec<String>,
    },
    /// Recompute a verdict and show the trades behind it
    Audit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        #[arg(long)]
        symbol: String,
    },
    /// List pattern confirmations without simulating
    Patterns {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        #[arg(long)]
        symbol: String,
    },
    /// Combine all dimensions into a trade decision
    Decide {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        fundamental: Option<f64>,
        #[arg(long)]
        sentiment: Option<f64>,
        #[arg(long)]
        management: Option<f64>,
    },
    /// Delete cached verdicts older than the TTL
    PurgeCache {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate {
            config,
            strategy,
            symbols,
        } => run_validate(&config, &strategy, symbols),
        Command::Audit {
            config,
            strategy,
            symbol,
        } => run_audit(&config, &strategy, &symbol),
        Command::Patterns {
            config,
            strategy,
            symbol,
        } => run_patterns(&config, &strategy, &symbol),
        Command::Decide {
            config,
            strategy,
            symbol,
            fundamental,
            sentiment,
            management,
        } => run_decide(
            &config,
            &strategy,
            &symbol,
            [fundamental, sentiment, management],
        ),
        Command::PurgeCache { config } => run_purge_cache(&config),
        Command::CheckConfig { config } => run_check_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, StratgateError> {
    info!("loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), StratgateError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn usize_or(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    config.get_int(section, key, default as i64).max(0) as usize
}

/// Detector, simulation and acceptance settings; rejects out-of-range values.
pub fn build_validation_settings(
    config: &dyn ConfigPort,
) -> Result<ValidationSettings, StratgateError> {
    validate_strategy_config(config)?;

    let gc = GoldenCrossParams::default();
    let golden_cross = GoldenCrossParams {
        short_window: usize_or(config, "golden_cross", "short_window", gc.short_window),
        long_window: usize_or(config, "golden_cross", "long_window", gc.long_window),
        target_pct: config.get_double("golden_cross", "target_pct", gc.target_pct),
        stop_pct: config.get_double("golden_cross", "stop_pct", gc.stop_pct),
    };

    let hs = HeadShouldersParams::default();
    let head_shoulders = HeadShouldersParams {
        window: usize_or(config, "head_shoulders", "window", hs.window),
        pivot_order: usize_or(config, "head_shoulders", "pivot_order", hs.pivot_order),
        volume_window: usize_or(config, "head_shoulders", "volume_window", hs.volume_window),
        volume_multiplier: config.get_double("head_shoulders", "volume_multiplier", hs.volume_multiplier),
    };

    let ch = CupHandleParams::default();
    let cup_handle = CupHandleParams {
        min_depth_pct: config.get_double("cup_handle", "min_depth", ch.min_depth_pct),
        max_depth_pct: config.get_double("cup_handle", "max_depth", ch.max_depth_pct),
        handle_max_retrace_pct: config.get_double(
            "cup_handle",
            "handle_max_retrace",
            ch.handle_max_retrace_pct,
        ),
        handle_min_bars: usize_or(config, "cup_handle", "handle_min_bars", ch.handle_min_bars),
        handle_max_fraction_pct: config.get_double(
            "cup_handle",
            "handle_max_fraction",
            ch.handle_max_fraction_pct,
        ),
        min_cup_bars: usize_or(config, "cup_handle", "min_cup_bars", ch.min_cup_bars),
        max_cup_bars: usize_or(config, "cup_handle", "max_cup_bars", ch.max_cup_bars),
        rim_tolerance_pct: config.get_double("cup_handle", "rim_tolerance", ch.rim_tolerance_pct),
        pivot_order: usize_or(config, "cup_handle", "pivot_order", ch.pivot_order),
        volume_window: usize_or(config, "cup_handle", "volume_window", ch.volume_window),
        volume_multiplier: config.get_double("cup_handle", "volume_multiplier", ch.volume_multiplier),
        stop_buffer_pct: config.get_double("cup_handle", "stop_buffer_pct", ch.stop_buffer_pct),
    };

    let entry_fill = match config.get_string_or("simulation", "entry_fill", "close").as_str() {
        "next_open" => EntryFill::NextOpen,
        _ => EntryFill::ConfirmationClose,
    };
    let max_concurrent = match usize_or(config, "simulation", "max_concurrent", 0) {
        0 => None,
        n => Some(n),
    };

    let ac = AcceptanceCriteria::default();
    let acceptance = AcceptanceCriteria {
        min_closed_trades: usize_or(config, "validation", "min_closed_trades", ac.min_closed_trades),
        min_win_rate: config.get_double("validation", "min_win_rate", ac.min_win_rate),
        min_profit_factor: config.get_double("validation", "min_profit_factor", ac.min_profit_factor),
        max_drawdown: config.get_double("validation", "max_drawdown", ac.max_drawdown),
    };

    let mut settings = ValidationSettings {
        simulation: SimulationConfig {
            entry_fill,
            max_concurrent,
        },
        acceptance,
        history_years: config.get_int("validation", "history_years", DEFAULT_HISTORY_YEARS as i64) as u32,
        cache_ttl_days: config.get_int("cache", "ttl_days", DEFAULT_CACHE_TTL_DAYS),
        ..Default::default()
    };
    settings.detector.golden_cross = golden_cross;
    settings.detector.head_shoulders = head_shoulders;
    settings.detector.cup_handle = cup_handle;
    Ok(settings)
}

pub fn build_decision_config(config: &dyn ConfigPort) -> DecisionConfig {
    let d = DecisionConfig::default();
    DecisionConfig {
        weight_fundamental: config.get_double("decision", "weight_fundamental", d.weight_fundamental),
        weight_technical: config.get_double("decision", "weight_technical", d.weight_technical),
        weight_sentiment: config.get_double("decision", "weight_sentiment", d.weight_sentiment),
        weight_management: config.get_double("decision", "weight_management", d.weight_management),
        ..d
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_backends(
    config: &dyn ConfigPort,
    for_data: bool,
    for_cache: bool,
) -> Result<(Option<Arc<dyn DataPort>>, Option<Arc<dyn VerdictStore>>), StratgateError> {
    if !for_data && !for_cache {
        return Ok((None, None));
    }
    let adapter = match SqliteAdapter::from_config(config) {
        Ok(adapter) => Arc::new(adapter),
        // Prices are required; a persistent cache is not.
        Err(e) if !for_data => {
            warn!(error = %e, "verdict cache unavailable, validating with an in-memory cache");
            return Ok((None, None));
        }
        Err(e) => return Err(e),
    };
    let data: Option<Arc<dyn DataPort>> = if for_data {
        Some(adapter.clone())
    } else {
        None
    };
    let store: Option<Arc<dyn VerdictStore>> = if for_cache { Some(adapter) } else { None };
    Ok((data, store))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_backends(
    _config: &dyn ConfigPort,
    for_data: bool,
    for_cache: bool,
) -> Result<(Option<Arc<dyn DataPort>>, Option<Arc<dyn VerdictStore>>), StratgateError> {
    if for_data || for_cache {
        return Err(StratgateError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "path".to_string(),
            reason: "built without the sqlite feature".to_string(),
        });
    }
    Ok((None, None))
}

/// Price source and verdict store per `[data] source` and `[cache] backend`.
/// When both use SQLite they share one connection pool. An unreachable
/// SQLite cache falls back to memory.
pub fn build_backends(
    config: &dyn ConfigPort,
) -> Result<(Arc<dyn DataPort>, Arc<dyn VerdictStore>), StratgateError> {
    let source = config.get_string_or("data", "source", "csv");
    let backend = config.get_string_or("cache", "backend", "memory");
    let (sqlite_data, sqlite_store) =
        sqlite_backends(config, source == "sqlite", backend == "sqlite")?;

    let data = match sqlite_data {
        Some(data) => data,
        None => {
            let dir = config
                .get_string("data", "csv_dir")
                .ok_or_else(|| StratgateError::ConfigMissing {
                    section: "data".to_string(),
                    key: "csv_dir".to_string(),
                })?;
            Arc::new(CsvAdapter::new(PathBuf::from(dir))) as Arc<dyn DataPort>
        }
    };
    let store = sqlite_store
        .unwrap_or_else(|| Arc::new(MemoryVerdictStore::new()) as Arc<dyn VerdictStore>);
    Ok((data, store))
}

pub fn build_validator(config: &dyn ConfigPort) -> Result<StrategyValidator, StratgateError> {
    let settings = build_validation_settings(config)?;
    let (data, store) = build_backends(config)?;
    StrategyValidator::new(data, store, Arc::new(SystemClock), settings)
}

/// Static scorers from `[scores.<SYMBOL>]`, with command-line overrides.
pub fn build_scorers(config: &dyn ConfigPort, symbol: &str, overrides: [Option<f64>; 3]) -> Scorers {
    let symbols = [symbol.to_string()];
    let scorer = |dimension: Dimension, value: Option<f64>| {
        let adapter = StaticScoreAdapter::from_config(config, dimension, &symbols);
        match value {
            Some(v) => adapter.with_score(symbol, v),
            None => adapter,
        }
    };
    let [fundamental, sentiment, management] = overrides;
    Scorers {
        fundamental: Box::new(scorer(Dimension::Fundamental, fundamental)),
        sentiment: Box::new(scorer(Dimension::Sentiment, sentiment)),
        management: Box::new(scorer(Dimension::Management, management)),
    }
}

fn run_validate(config_path: &Path, strategy: &str, symbols: Vec<String>) -> Result<(), StratgateError> {
    let kind: PatternKind = strategy.parse()?;
    let config = load_config(config_path)?;
    let validator = build_validator(&config)?;

    let symbols = if symbols.is_empty() {
        validator.data().list_symbols()?
    } else {
        symbols
    };
    info!(strategy = %kind, symbols = symbols.len(), "validating");

    let verdicts = validate_many(&validator, &symbols, kind);
    let accepted = verdicts.iter().filter(|v| v.validated).count();
    info!(accepted, rejected = verdicts.len() - accepted, "done");
    print_json(&verdicts)
}

fn run_audit(config_path: &Path, strategy: &str, symbol: &str) -> Result<(), StratgateError> {
    let kind: PatternKind = strategy.parse()?;
    let config = load_config(config_path)?;
    let validator = build_validator(&config)?;
    print_json(&validator.audit(symbol, kind))
}

fn run_patterns(config_path: &Path, strategy: &str, symbol: &str) -> Result<(), StratgateError> {
    let kind: PatternKind = strategy.parse()?;
    let config = load_config(config_path)?;
    let validator = build_validator(&config)?;
    print_json(&validator.scan(symbol, kind)?)
}

fn run_decide(
    config_path: &Path,
    strategy: &str,
    symbol: &str,
    overrides: [Option<f64>; 3],
) -> Result<(), StratgateError> {
    let kind: PatternKind = strategy.parse()?;
    let config = load_config(config_path)?;
    let validator = build_validator(&config)?;
    let scorers = build_scorers(&config, symbol, overrides);
    let decision = analyze_symbol(symbol, kind, &validator, &scorers, &build_decision_config(&config))?;
    info!(symbol, action = %decision.action, "decision");
    print_json(&decision)
}

fn run_purge_cache(config_path: &Path) -> Result<(), StratgateError> {
    let config = load_config(config_path)?;
    let validator = build_validator(&config)?;
    let purged = validator.cache().purge_stale()?;
    info!(purged, "purged stale verdicts");
    print_json(&serde_json::json!({ "purged": purged }))
}

fn run_check_config(config_path: &Path) -> Result<(), StratgateError> {
    let config = load_config(config_path)?;
    let settings = build_validation_settings(&config)?;
    let decision = build_decision_config(&config);
    print_json(&serde_json::json!({
        "settings": settings,
        "decision": decision,
    }))
}
