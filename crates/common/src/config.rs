//! Monitor configuration types.

use serde::{Deserialize, Serialize};

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Cloud project the geospatial backend bills queries against.
    #[serde(default = "default_project")]
    pub project: String,

    /// Monitored location.
    #[serde(default)]
    pub location: LocationConfig,

    /// Durable cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-operation cache TTL tiers (minutes).
    #[serde(default)]
    pub ttl: CacheTtlConfig,

    /// Risk and status thresholds.
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Refresh intervals for the watch loop (minutes).
    #[serde(default)]
    pub timing: TimingConfig,

    /// Analysis window and forecast horizon.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Remote analytics gateway.
    #[serde(default)]
    pub backend: BackendConfig,
}

/// The single fixed location being monitored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Machine-friendly name embedded in snapshots (e.g., "Tashkent_Uzbekistan").
    #[serde(default = "default_location_name")]
    pub name: String,
    /// Human-readable name for status reports.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Latitude.
    #[serde(default = "default_lat")]
    pub lat: f64,
    /// Longitude.
    #[serde(default = "default_lon")]
    pub lon: f64,
    /// Radius of the circular analysis region in meters.
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,
}

/// Durable cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false every memoized operation calls straight through.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Root directory holding `data/` and `metadata/`.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Store-wide default TTL, also used by the expiry sweep.
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_minutes: u64,
}

/// TTL tiers, one per operation class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    #[serde(default = "default_modis_ttl")]
    pub modis_minutes: u64,
    #[serde(default = "default_landsat_ttl")]
    pub landsat_minutes: u64,
    #[serde(default = "default_risk_ttl")]
    pub risk_minutes: u64,
    #[serde(default = "default_forecast_ttl")]
    pub forecast_minutes: u64,
}

/// Risk level and status label thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Risk index above which the level is "high".
    #[serde(default = "default_dust_risk_high")]
    pub dust_risk_high: f64,
    /// Risk index above which the level is "moderate".
    #[serde(default = "default_dust_risk_moderate")]
    pub dust_risk_moderate: f64,
    /// Surface temperature (°C) above which the status is "High".
    #[serde(default = "default_temperature_high")]
    pub temperature_high: f64,
    /// NDDI above which an elevated dust signature is reported.
    #[serde(default = "default_nddi_elevated")]
    pub nddi_elevated: f64,
}

/// Watch-loop refresh intervals (minutes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_data_update_interval")]
    pub data_update_interval_minutes: u64,
    #[serde(default = "default_forecast_update_interval")]
    pub forecast_update_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Look-back window for current conditions.
    #[serde(default = "default_days_back")]
    pub days_back: i64,
    /// Forecast horizon.
    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
}

/// Analytics gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the reduce-region gateway.
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// Bearer token (optional).
    #[serde(default)]
    pub access_token: String,
    /// Per-request timeout. Aggregate queries are slow.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
    /// Client-side rate limit.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_project() -> String {
    "youtubecommentsapp".into()
}

fn default_location_name() -> String {
    "Tashkent_Uzbekistan".into()
}
fn default_display_name() -> String {
    "Tashkent, Uzbekistan".into()
}
fn default_lat() -> f64 {
    41.2995
}
fn default_lon() -> f64 {
    69.2401
}
fn default_radius_m() -> f64 {
    50_000.0
}

fn default_cache_dir() -> String {
    "cache".into()
}
fn default_cache_ttl() -> u64 {
    30
}

fn default_modis_ttl() -> u64 {
    30
}
fn default_landsat_ttl() -> u64 {
    60
}
fn default_risk_ttl() -> u64 {
    15
}
fn default_forecast_ttl() -> u64 {
    120
}

fn default_dust_risk_high() -> f64 {
    0.6
}
fn default_dust_risk_moderate() -> f64 {
    0.3
}
fn default_temperature_high() -> f64 {
    35.0
}
fn default_nddi_elevated() -> f64 {
    0.15
}

fn default_data_update_interval() -> u64 {
    30
}
fn default_forecast_update_interval() -> u64 {
    360
}

fn default_days_back() -> i64 {
    60
}
fn default_forecast_days() -> usize {
    7
}

fn default_backend_url() -> String {
    "http://localhost:8085".into()
}
fn default_backend_timeout() -> u64 {
    120
}
fn default_requests_per_minute() -> u32 {
    30
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            name: default_location_name(),
            display_name: default_display_name(),
            lat: default_lat(),
            lon: default_lon(),
            radius_m: default_radius_m(),
        }
    }
}

impl LocationConfig {
    /// Coordinates in `[lon, lat]` order, as the backend expects them.
    pub fn coordinates(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            dir: default_cache_dir(),
            default_ttl_minutes: default_cache_ttl(),
        }
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            modis_minutes: default_modis_ttl(),
            landsat_minutes: default_landsat_ttl(),
            risk_minutes: default_risk_ttl(),
            forecast_minutes: default_forecast_ttl(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            dust_risk_high: default_dust_risk_high(),
            dust_risk_moderate: default_dust_risk_moderate(),
            temperature_high: default_temperature_high(),
            nddi_elevated: default_nddi_elevated(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            data_update_interval_minutes: default_data_update_interval(),
            forecast_update_interval_minutes: default_forecast_update_interval(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
            forecast_days: default_forecast_days(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            access_token: String::new(),
            timeout_secs: default_backend_timeout(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            location: LocationConfig::default(),
            cache: CacheConfig::default(),
            ttl: CacheTtlConfig::default(),
            thresholds: ThresholdConfig::default(),
            timing: TimingConfig::default(),
            analysis: AnalysisConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}
