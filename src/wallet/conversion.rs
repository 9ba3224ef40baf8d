//! Conversion-fee configuration and the fixed exchange-rate table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fee-change audit trail keeps at most this many entries.
pub const FEE_HISTORY_CAP: usize = 50;

/// Percentage fee charged per target currency when converting suspended
/// gold to fiat. Persisted as one document; changes append to a capped
/// history document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionFeeConfig {
    /// Currency code to fee percent (0..=100).
    pub fees: HashMap<String, f64>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl Default for ConversionFeeConfig {
    fn default() -> Self {
        let mut fees = HashMap::new();
        fees.insert("USD".to_string(), 5.0);
        fees.insert("TOMAN".to_string(), 5.0);
        Self {
            fees,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }
}

/// One entry in the fee-change audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionFeeChange {
    pub currency: String,
    pub percent: f64,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Rate-table lookup key: `{FROM}_to_{TO}`.
pub fn rate_key(from: &str, to: &str) -> String {
    format!("{from}_to_{to}")
}

/// Default fixed exchange rates. A pair missing from this table makes the
/// requesting conversion fail; there is no silent 1:1 fallback.
pub fn default_exchange_rates() -> HashMap<String, f64> {
    let mut rates = HashMap::new();
    rates.insert(rate_key("USD", "TOMAN"), 100_000.0);
    rates.insert(rate_key("TOMAN", "USD"), 0.00001);
    rates.insert(rate_key("GOLD", "USD"), 0.05);
    rates.insert(rate_key("USD", "GOLD"), 20.0);
    rates.insert(rate_key("GOLD", "TOMAN"), 5_000.0);
    rates.insert(rate_key("TOMAN", "GOLD"), 0.0002);
    rates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fees_cover_static_currencies() {
        let config = ConversionFeeConfig::default();
        assert_eq!(config.fees.get("USD"), Some(&5.0));
        assert_eq!(config.fees.get("TOMAN"), Some(&5.0));
    }

    #[test]
    fn rate_key_format() {
        assert_eq!(rate_key("GOLD", "USD"), "GOLD_to_USD");
    }

    #[test]
    fn default_rates_are_directional() {
        let rates = default_exchange_rates();
        assert!(rates.contains_key("USD_to_TOMAN"));
        assert!(rates.contains_key("TOMAN_to_USD"));
        assert!(!rates.contains_key("GOLD_to_GOLD"));
    }
}
