//! Domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Cache reporting ───────────────────────────────────────────────────

/// Point-in-time view of the cache counters plus on-disk usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hit_rate_percent: f64,
    pub total_requests: u64,
    pub cache_files: u64,
    pub cache_size_bytes: u64,
    pub cache_size_mb: f64,
    pub hits: u64,
    pub misses: u64,
    pub saves: u64,
    pub errors: u64,
}

// ── Remote aggregates ─────────────────────────────────────────────────

/// Land-surface temperature summary over the monitored region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModisAggregate {
    /// Mean daytime land-surface temperature (°C).
    pub lst_day_mean: f64,
    pub lst_day_std: f64,
    /// Source images in the composite.
    pub modis_count: u64,
}

/// Vegetation and dust-difference index summary over the monitored region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandsatAggregate {
    pub ndvi_mean: f64,
    pub ndvi_std: f64,
    pub nddi_mean: f64,
    pub nddi_std: f64,
    pub landsat_count: u64,
}

// ── Risk ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }
}

/// Output of the dust risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Normalized risk in [0, 1].
    pub dust_risk_index: f64,
    pub risk_level: RiskLevel,
    pub temperature_factor: f64,
    pub vegetation_factor: f64,
    pub dust_factor: f64,
}

/// Human-readable condition labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStatus {
    pub temperature_status: String,
    pub vegetation_status: String,
    pub dust_signature_status: String,
}

/// Everything known about the monitored location right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub analysis_period_days: i64,
    pub execution_time_seconds: f64,
    /// e.g. "MODIS_LST_12,Landsat_4".
    pub data_sources: String,
    pub modis: ModisAggregate,
    pub landsat: LandsatAggregate,
    pub risk: RiskAssessment,
    pub status: ConditionStatus,
    pub location: String,
    /// `[lon, lat]`.
    pub coordinates: [f64; 2],
    pub cache_stats: CacheStatsSnapshot,
}

// ── Forecast ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tendency {
    Increasing,
    Decreasing,
    Stable,
    Current,
}

/// One day of the synthetic forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub day_name: String,
    pub day_short: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// °C, one decimal.
    pub temperature: f64,
    pub confidence: f64,
    pub tendency: Tendency,
    pub day_index: usize,
}

// ── Envelopes and reports ─────────────────────────────────────────────

/// Diagnostics returned in place of a payload when a pipeline fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub error: String,
    pub execution_time_seconds: f64,
    pub cache_stats: CacheStatsSnapshot,
}

/// Tagged success-or-failure response; nothing raises past the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum Envelope<T> {
    Success(T),
    Failure(FailureReport),
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Envelope::Success(body) => Some(body),
            Envelope::Failure(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: String,
    pub project: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub coordinates: [f64; 2],
    pub cache_performance: CacheStatsSnapshot,
    pub cache_enabled: bool,
    pub cache_ttl_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub cache_healthy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearReport {
    pub cleared_files: u64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serializes_tagged() {
        let ok: Envelope<Vec<u32>> = Envelope::Success(vec![1, 2]);
        let value = serde_json::to_value(&ok).expect("serializes");
        assert_eq!(value["status"], "success");
        assert_eq!(value["body"][1], 2);

        let failed: Envelope<Vec<u32>> = Envelope::Failure(FailureReport {
            error: "backend down".into(),
            execution_time_seconds: 0.5,
            cache_stats: CacheStatsSnapshot::default(),
        });
        let value = serde_json::to_value(&failed).expect("serializes");
        assert_eq!(value["status"], "failure");
        assert_eq!(value["body"]["error"], "backend down");
        assert!(value["body"]["cache_stats"].is_object());
    }

    #[test]
    fn test_risk_level_lowercase() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Moderate).expect("serializes"),
            "\"moderate\""
        );
        assert_eq!(RiskLevel::High.as_str(), "high");
    }
}
