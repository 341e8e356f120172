use std::collections::BTreeMap;

use nightscreen_core::{NightscreenError, Sector};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SectorConfigFile {
    sectors: BTreeMap<String, Vec<String>>,
}

/// The scanning universe: up to 30 tickers per sector, across 8 sectors.
#[derive(Debug, Clone)]
pub struct Universe {
    pub by_sector: BTreeMap<Sector, Vec<String>>,
}

impl Universe {
    pub fn from_json(raw: &str) -> Result<Self, NightscreenError> {
        let parsed: SectorConfigFile = serde_json::from_str(raw)
            .map_err(|e| NightscreenError::ConfigError(format!("sector config: {e}")))?;

        let mut by_sector = BTreeMap::new();
        for (key, tickers) in parsed.sectors {
            let sector = Sector::from_config_key(&key).ok_or_else(|| {
                NightscreenError::ConfigError(format!("unknown sector in config: {key}"))
            })?;
            by_sector.insert(sector, tickers);
        }

        for sector in Sector::all() {
            if !by_sector.contains_key(&sector) {
                return Err(NightscreenError::ConfigError(format!(
                    "sector config missing required sector: {}",
                    sector.as_str()
                )));
            }
        }

        Ok(Universe { by_sector })
    }

    pub fn total_tickers(&self) -> usize {
        self.by_sector.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        let sectors = [
            "Financials",
            "Materials",
            "Energy",
            "Healthcare",
            "Consumer Discretionary",
            "Industrials",
            "Real Estate",
            "Utilities",
        ];
        let entries: Vec<String> = sectors
            .iter()
            .map(|s| format!("\"{s}\": [\"AAA.AX\", \"BBB.AX\"]"))
            .collect();
        format!("{{\"sectors\": {{{}}}}}", entries.join(","))
    }

    #[test]
    fn parses_all_eight_sectors() {
        let universe = Universe::from_json(&sample_json()).unwrap();
        assert_eq!(universe.by_sector.len(), 8);
        assert_eq!(universe.total_tickers(), 16);
    }

    #[test]
    fn rejects_config_missing_a_sector() {
        let raw = r#"{"sectors": {"Financials": ["CBA.AX"]}}"#;
        assert!(Universe::from_json(raw).is_err());
    }
}
