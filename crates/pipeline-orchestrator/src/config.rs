use std::path::Path;

use market_data_adapter::AdapterConfig;
use nightscreen_core::NightscreenError;
use serde::Deserialize;

use batch_predictor::EnsembleWeights;
use event_risk_guard::EventGuardConfig;

/// `scanner.min_price` / `scanner.min_avg_volume` / `scanner.max_workers`
/// (spec.md §6). `max_workers` is carried here for config-file discoverability
/// but the actual cap is enforced by the single semaphore
/// `MarketDataAdapter` owns (`adapter.max_workers` via [`AdapterConfig`]) — the
/// two must be set to the same value; `RunConfig::load` does not reconcile
/// them automatically.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub min_price: f64,
    pub min_avg_volume: u64,
    pub max_workers: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_price: 0.50,
            min_avg_volume: 500_000,
            max_workers: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnsembleSection {
    pub weights: EnsembleWeights,
}

/// `run.hard_cap_minutes` (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub hard_cap_minutes: i64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self { hard_cap_minutes: 120 }
    }
}

/// Every recognized option in spec.md §6's run configuration table, loaded
/// from a single JSON file. Unspecified sections, and unspecified keys
/// within a specified section, fall back to their documented defaults —
/// mirroring the teacher's "env var missing => sensible default" posture in
/// `NotificationConfig::from_env`, generalized from env vars to JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub scanner: ScannerConfig,
    pub event_guard: EventGuardConfig,
    pub ensemble: EnsembleSection,
    pub adapter: AdapterConfig,
    pub run: RunSection,
}

impl RunConfig {
    /// A run always has *a* config, even with no file on disk — matching
    /// spec.md §6's posture that every option has a stated default.
    pub fn load(path: Option<&Path>) -> Result<Self, NightscreenError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            NightscreenError::ConfigError(format!("run config {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| NightscreenError::ConfigError(format!("run config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_uses_defaults() {
        let config = RunConfig::load(None).unwrap();
        assert_eq!(config.scanner.min_price, 0.50);
        assert_eq!(config.run.hard_cap_minutes, 120);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_config.json");
        std::fs::write(&path, r#"{"scanner": {"min_price": 1.25}}"#).unwrap();
        let config = RunConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scanner.min_price, 1.25);
        assert_eq!(config.scanner.min_avg_volume, 500_000);
        assert_eq!(config.adapter.timeout_s, 15);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(RunConfig::load(Some(&path)).is_err());
    }
}
