//! Everything that shapes a verdict, and its fingerprint.

use serde::{Deserialize, Serialize};

use super::error::StratgateError;
use super::pattern::{DetectorParams, PatternKind};
use super::simulator::SimulationConfig;
use super::verdict::AcceptanceCriteria;

pub const DEFAULT_HISTORY_YEARS: u32 = 5;
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSettings {
    pub detector: DetectorParams,
    pub simulation: SimulationConfig,
    pub acceptance: AcceptanceCriteria,
    /// Years of daily bars requested, counted back from today.
    pub history_years: u32,
    pub cache_ttl_days: i64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        ValidationSettings {
            detector: DetectorParams::default(),
            simulation: SimulationConfig::default(),
            acceptance: AcceptanceCriteria::default(),
            history_years: DEFAULT_HISTORY_YEARS,
            cache_ttl_days: DEFAULT_CACHE_TTL_DAYS,
        }
    }
}

/// The inputs a verdict for one kind depends on. The cache TTL is absent:
/// changing it must not orphan existing entries.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    strategy: PatternKind,
    detector: serde_json::Value,
    simulation: &'a SimulationConfig,
    acceptance: &'a AcceptanceCriteria,
    history_years: u32,
}

impl ValidationSettings {
    /// Stable hex digest of the parameters that affect `kind`'s verdict.
    /// Detector parameters for other kinds are left out.
    pub fn fingerprint(&self, kind: PatternKind) -> Result<String, StratgateError> {
        let detector = match kind {
            PatternKind::GoldenCross => serde_json::to_value(&self.detector.golden_cross)?,
            PatternKind::ReverseHeadShoulder => serde_json::to_value(&self.detector.head_shoulders)?,
            PatternKind::CupWithHandle => serde_json::to_value(&self.detector.cup_handle)?,
        };
        let input = FingerprintInput {
            strategy: kind,
            detector,
            simulation: &self.simulation,
            acceptance: &self.acceptance,
            history_years: self.history_years,
        };
        let json = serde_json::to_string(&input)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
