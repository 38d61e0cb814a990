//! Symbol Mapper (spec §4.1), grounded on `utils/symbol_mapper.py`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Suffixes the mapper strips when attempting a fuzzy match (spec §4.1),
/// in the exact order the Python original tries them.
const KNOWN_SUFFIXES: [&str; 10] =
    ["M", ".A", "_SB", ".", ".M", ".PRO", "_M", "_A", "M.", "A."];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub canonical_to_broker: HashMap<String, String>,
    pub broker_to_canonical: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    mapping: SymbolMapping,
}

impl SymbolMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_mapping(mapping: SymbolMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &SymbolMapping {
        &self.mapping
    }

    /// Rebuild the mapping from a broker symbol list and the set of
    /// required canonical pairs, persisting both directions (spec §4.1).
    pub fn scan_and_map(&mut self, broker_symbols: &[String], required: &[String]) -> HashMap<String, Option<String>> {
        info!("SymbolMapper: scanning {} broker symbols", broker_symbols.len());
        let mut result = HashMap::new();

        for pair in required {
            let matched = Self::find_matching_symbol(pair, broker_symbols);
            match &matched {
                Some(broker) => {
                    self.mapping.canonical_to_broker.insert(pair.to_uppercase(), broker.clone());
                    self.mapping.broker_to_canonical.insert(broker.clone(), pair.to_uppercase());
                    info!("SymbolMapper: {} -> {}", pair, broker);
                }
                None => {
                    warn!("SymbolMapper: no match found for required pair {}", pair);
                }
            }
            result.insert(pair.clone(), matched);
        }

        result
    }

    /// (i) exact match, (ii) suffix-stripped match, (iii) prefix match with
    /// a <=3-char tail assumed to be a suffix (spec §4.1).
    fn find_matching_symbol(base_pair: &str, broker_symbols: &[String]) -> Option<String> {
        let base_upper = base_pair.to_uppercase();

        if broker_symbols.iter().any(|s| s.to_uppercase() == base_upper) {
            return broker_symbols.iter().find(|s| s.to_uppercase() == base_upper).cloned();
        }

        for symbol in broker_symbols {
            let clean = symbol.to_uppercase();

            for suffix in KNOWN_SUFFIXES {
                if let Some(without) = clean.strip_suffix(suffix)
                    && without == base_upper
                {
                    return Some(symbol.clone());
                }
            }

            if let Some(remaining) = clean.strip_prefix(&base_upper)
                && (KNOWN_SUFFIXES.contains(&remaining) || remaining.len() <= 3)
            {
                return Some(symbol.clone());
            }
        }

        None
    }

    /// Returns the broker symbol, or the input unchanged if unmapped
    /// (spec §4.1 — no errors propagated).
    pub fn get_real(&self, canonical: &str) -> String {
        self.mapping
            .canonical_to_broker
            .get(&canonical.to_uppercase())
            .cloned()
            .unwrap_or_else(|| canonical.to_string())
    }

    /// Inverse of `get_real`, same fallback behavior.
    pub fn get_canonical(&self, broker: &str) -> String {
        self.mapping.broker_to_canonical.get(broker).cloned().unwrap_or_else(|| broker.to_string())
    }

    pub fn validate(&self, required: &[String]) -> HashMap<String, bool> {
        required
            .iter()
            .map(|p| (p.clone(), self.mapping.canonical_to_broker.contains_key(&p.to_uppercase())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_5_symbol_mapping() {
        let broker_symbols = vec!["EURUSDm".to_string(), "GBPUSD.a".to_string(), "USDJPY".to_string()];
        let required = vec!["EURUSD".to_string(), "GBPUSD".to_string(), "USDJPY".to_string(), "AUDUSD".to_string()];
        let mut mapper = SymbolMapper::new();
        let result = mapper.scan_and_map(&broker_symbols, &required);

        assert_eq!(result["EURUSD"], Some("EURUSDm".to_string()));
        assert_eq!(result["GBPUSD"], Some("GBPUSD.a".to_string()));
        assert_eq!(result["USDJPY"], Some("USDJPY".to_string()));
        assert_eq!(result["AUDUSD"], None);

        let validation = mapper.validate(&required);
        assert!(!validation["AUDUSD"]);
        assert!(validation["EURUSD"]);
    }

    #[test]
    fn get_real_roundtrips_with_get_canonical() {
        let broker_symbols = vec!["EURUSDm".to_string()];
        let required = vec!["EURUSD".to_string()];
        let mut mapper = SymbolMapper::new();
        mapper.scan_and_map(&broker_symbols, &required);

        assert_eq!(mapper.get_real("EURUSD"), "EURUSDm");
        assert_eq!(mapper.get_canonical("EURUSDm"), "EURUSD");
        assert_eq!(mapper.get_canonical(&mapper.get_real("EURUSD")), "EURUSD");
        assert_eq!(mapper.get_real(&mapper.get_canonical("EURUSDm")), "EURUSDm");
    }

    #[test]
    fn unmapped_symbol_falls_back_to_input_unchanged() {
        let mapper = SymbolMapper::new();
        assert_eq!(mapper.get_real("AUDCAD"), "AUDCAD");
        assert_eq!(mapper.get_canonical("AUDCADxyz"), "AUDCADxyz");
    }
}
