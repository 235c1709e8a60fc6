//! Configuration validation.
//!
//! Validates every tunable before any data is touched. Missing keys fall
//! back to defaults; present keys must be in range.

use crate::domain::error::StratgateError;
use crate::ports::config_port::ConfigPort;

const WEIGHT_TOLERANCE: f64 = 1e-6;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    validate_data_config(config)?;
    validate_cache_config(config)?;
    validate_strategy_config(config)?;
    validate_decision_config(config)?;
    Ok(())
}

/// Everything that feeds pattern detection, simulation and acceptance.
pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    validate_validation_config(config)?;
    validate_simulation_config(config)?;
    validate_golden_cross(config)?;
    validate_head_shoulders(config)?;
    validate_cup_handle(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> StratgateError {
    StratgateError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), StratgateError> {
    if config.get_int(section, key, default) <= 0 {
        return Err(invalid(section, key, &format!("{key} must be a positive integer")));
    }
    Ok(())
}

fn require_percent(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), StratgateError> {
    let value = config.get_double(section, key, default);
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(section, key, &format!("{key} must be between 0 and 100")));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    let source = config.get_string_or("data", "source", "csv");
    match source.as_str() {
        "csv" => {
            if config.get_string("data", "csv_dir").is_none_or(|s| s.trim().is_empty()) {
                return Err(StratgateError::ConfigMissing {
                    section: "data".to_string(),
                    key: "csv_dir".to_string(),
                });
            }
        }
        "sqlite" => validate_sqlite_config(config)?,
        _ => return Err(invalid("data", "source", "source must be csv or sqlite")),
    }
    Ok(())
}

fn validate_sqlite_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    if cfg!(not(feature = "sqlite")) {
        return Err(invalid("sqlite", "path", "built without the sqlite feature"));
    }
    if config.get_string("sqlite", "path").is_none_or(|s| s.trim().is_empty()) {
        return Err(StratgateError::ConfigMissing {
            section: "sqlite".to_string(),
            key: "path".to_string(),
        });
    }
    require_positive_int(config, "sqlite", "pool_size", 4)?;
    require_positive_int(config, "sqlite", "connect_timeout_secs", 5)
}

pub fn validate_cache_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    match config.get_string_or("cache", "backend", "memory").as_str() {
        "memory" => {}
        "sqlite" => validate_sqlite_config(config)?,
        _ => return Err(invalid("cache", "backend", "backend must be memory or sqlite")),
    }
    require_positive_int(config, "cache", "ttl_days", 90)
}

pub fn validate_validation_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    require_positive_int(config, "validation", "history_years", 5)?;
    require_positive_int(config, "validation", "min_closed_trades", 5)?;
    require_percent(config, "validation", "min_win_rate", 70.0)?;

    let profit_factor = config.get_double("validation", "min_profit_factor", 1.5);
    if profit_factor < 0.0 {
        return Err(invalid(
            "validation",
            "min_profit_factor",
            "min_profit_factor must be non-negative",
        ));
    }

    let drawdown = config.get_double("validation", "max_drawdown", -25.0);
    if !(-100.0..=0.0).contains(&drawdown) {
        return Err(invalid(
            "validation",
            "max_drawdown",
            "max_drawdown must be between -100 and 0",
        ));
    }
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    match config.get_string_or("simulation", "entry_fill", "close").as_str() {
        "close" | "next_open" => {}
        _ => {
            return Err(invalid(
                "simulation",
                "entry_fill",
                "entry_fill must be close or next_open",
            ));
        }
    }
    if config.get_int("simulation", "max_concurrent", 0) < 0 {
        return Err(invalid(
            "simulation",
            "max_concurrent",
            "max_concurrent must be non-negative",
        ));
    }
    Ok(())
}

fn validate_golden_cross(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    require_positive_int(config, "golden_cross", "short_window", 20)?;
    require_positive_int(config, "golden_cross", "long_window", 50)?;
    let short = config.get_int("golden_cross", "short_window", 20);
    let long = config.get_int("golden_cross", "long_window", 50);
    if short >= long {
        return Err(invalid(
            "golden_cross",
            "short_window",
            "short_window must be less than long_window",
        ));
    }
    let target = config.get_double("golden_cross", "target_pct", 10.0);
    if target <= 0.0 {
        return Err(invalid("golden_cross", "target_pct", "target_pct must be positive"));
    }
    let stop = config.get_double("golden_cross", "stop_pct", 5.0);
    if stop <= 0.0 || stop >= 100.0 {
        return Err(invalid(
            "golden_cross",
            "stop_pct",
            "stop_pct must be between 0 and 100 exclusive",
        ));
    }
    Ok(())
}

fn validate_head_shoulders(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    require_positive_int(config, "head_shoulders", "window", 100)?;
    require_positive_int(config, "head_shoulders", "pivot_order", 5)?;
    require_positive_int(config, "head_shoulders", "volume_window", 20)?;
    let window = config.get_int("head_shoulders", "window", 100);
    let order = config.get_int("head_shoulders", "pivot_order", 5);
    // Three troughs need room for their confirming bars.
    if window <= 6 * order {
        return Err(invalid(
            "head_shoulders",
            "window",
            "window must exceed six times pivot_order",
        ));
    }
    if config.get_double("head_shoulders", "volume_multiplier", 1.5) <= 0.0 {
        return Err(invalid(
            "head_shoulders",
            "volume_multiplier",
            "volume_multiplier must be positive",
        ));
    }
    Ok(())
}

fn validate_cup_handle(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    const S: &str = "cup_handle";
    require_percent(config, S, "min_depth", 12.0)?;
    require_percent(config, S, "max_depth", 33.0)?;
    if config.get_double(S, "min_depth", 12.0) >= config.get_double(S, "max_depth", 33.0) {
        return Err(invalid(S, "min_depth", "min_depth must be less than max_depth"));
    }
    require_percent(config, S, "handle_max_retrace", 15.0)?;
    require_percent(config, S, "handle_max_fraction", 30.0)?;
    require_percent(config, S, "rim_tolerance", 5.0)?;
    require_percent(config, S, "stop_buffer_pct", 3.0)?;
    require_positive_int(config, S, "handle_min_bars", 5)?;
    require_positive_int(config, S, "min_cup_bars", 30)?;
    require_positive_int(config, S, "max_cup_bars", 250)?;
    if config.get_int(S, "min_cup_bars", 30) > config.get_int(S, "max_cup_bars", 250) {
        return Err(invalid(
            S,
            "min_cup_bars",
            "min_cup_bars must not exceed max_cup_bars",
        ));
    }
    require_positive_int(config, S, "pivot_order", 5)?;
    require_positive_int(config, S, "volume_window", 20)?;
    if config.get_double(S, "volume_multiplier", 1.5) <= 0.0 {
        return Err(invalid(S, "volume_multiplier", "volume_multiplier must be positive"));
    }
    Ok(())
}

pub fn validate_decision_config(config: &dyn ConfigPort) -> Result<(), StratgateError> {
    let weights = [
        ("weight_fundamental", 0.30),
        ("weight_technical", 0.30),
        ("weight_sentiment", 0.20),
        ("weight_management", 0.20),
    ];
    let mut sum = 0.0;
    for (key, default) in weights {
        let value = config.get_double("decision", key, default);
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid("decision", key, &format!("{key} must be between 0 and 1")));
        }
        sum += value;
    }
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(invalid(
            "decision",
            "weight_fundamental",
            &format!("weights must sum to 1, got {sum:.4}"),
        ));
    }
    Ok(())
}
