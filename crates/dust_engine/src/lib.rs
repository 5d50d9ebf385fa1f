//! Dust storm risk pipeline.
//!
//! Fetches remote aggregates, fuses them into a risk index, projects a
//! multi-day forecast, and wraps every expensive step in the durable cache.

pub mod analyzer;
pub mod entropy;
pub mod fetchers;
pub mod forecast;
pub mod risk;

use common::config::CacheTtlConfig;
use smart_cache::CachePolicy;

pub use analyzer::DustAnalyzer;
pub use entropy::{ConstantEntropy, EntropySource, RngEntropy};
pub use fetchers::DataFetchers;
pub use forecast::{build_forecast, ForecastBase, DEFAULT_FORECAST_DAYS, MAX_FORECAST_DAYS};
pub use risk::RiskEngine;

/// One cache policy per operation class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicies {
    pub modis: CachePolicy,
    pub landsat: CachePolicy,
    pub risk: CachePolicy,
    pub forecast: CachePolicy,
}

impl From<&CacheTtlConfig> for TtlPolicies {
    fn from(ttl: &CacheTtlConfig) -> Self {
        Self {
            modis: CachePolicy::minutes("get_modis_data", ttl.modis_minutes),
            landsat: CachePolicy::minutes("get_landsat_data", ttl.landsat_minutes),
            risk: CachePolicy::minutes("calculate_dust_risk", ttl.risk_minutes),
            forecast: CachePolicy::minutes("generate_forecast", ttl.forecast_minutes),
        }
    }
}

impl Default for TtlPolicies {
    fn default() -> Self {
        Self::from(&CacheTtlConfig::default())
    }
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
