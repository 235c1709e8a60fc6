//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod pattern;
pub mod simulator;
pub mod metrics;
pub mod verdict;
pub mod params;
pub mod cache;
pub mod validator;
pub mod decision;
pub mod analysis;
pub mod config_validation;
pub mod error;
