// Configuration for:
// - Cache settings (capacity, default TTL, per-prefix TTLs)
// - Transaction index freshness TTL
// - Maintenance sweep intervals
// - Suspension period and conversion fee/rate defaults

use std::time::Duration;

use dotenv::dotenv;
use std::env;

use crate::cache::CacheConfig;
use crate::wallet::conversion::default_exchange_rates;
use crate::wallet::WalletConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_max_entries: usize,
    pub cache_default_ttl: Duration,
    pub index_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub maturity_sweep_interval: Duration,
    pub suspension_months: u32,
    pub default_fee_percent: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let cache_max_entries = env::var("CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);
        let cache_default_ttl = env::var("CACHE_DEFAULT_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));
        let index_ttl = env::var("INDEX_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));
        let cache_sweep_interval = env::var("CACHE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));
        let maturity_sweep_interval = env::var("MATURITY_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(600));
        let suspension_months = env::var("SUSPENSION_MONTHS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .unwrap_or(2);
        let default_fee_percent = env::var("DEFAULT_CONVERSION_FEE_PERCENT")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5.0);

        Self {
            cache_max_entries,
            cache_default_ttl,
            index_ttl,
            cache_sweep_interval,
            maturity_sweep_interval,
            suspension_months,
            default_fee_percent,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache_max_entries,
            default_ttl: self.cache_default_ttl,
            ..CacheConfig::default()
        }
    }

    pub fn wallet_config(&self) -> WalletConfig {
        WalletConfig {
            suspension_months: self.suspension_months,
            exchange_rates: default_exchange_rates(),
            default_fee_percent: self.default_fee_percent,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_max_entries: 1000,
            cache_default_ttl: Duration::from_secs(300),
            index_ttl: Duration::from_secs(300),
            cache_sweep_interval: Duration::from_secs(60),
            maturity_sweep_interval: Duration::from_secs(600),
            suspension_months: 2,
            default_fee_percent: 5.0,
        }
    }
}
