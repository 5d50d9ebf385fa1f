//! Dust risk model and condition labels.

use common::config::ThresholdConfig;
use common::{ConditionStatus, LandsatAggregate, ModisAggregate, RiskAssessment, RiskLevel};

/// Surface temperature (°C) at which the temperature factor starts rising.
const TEMP_BASELINE: f64 = 25.0;
/// Degrees above baseline for a temperature factor of 1.0.
const TEMP_SPAN: f64 = 20.0;
const NDDI_OFFSET: f64 = 0.1;

const DUST_WEIGHT: f64 = 0.4;
const TEMP_WEIGHT: f64 = 0.3;
const VEG_WEIGHT: f64 = 0.3;

const LOW_VEGETATION_NDVI: f64 = 0.2;
const MODERATE_VEGETATION_NDVI: f64 = 0.4;

/// Weighted fusion of temperature, vegetation and dust-index factors.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    thresholds: ThresholdConfig,
}

impl RiskEngine {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    pub fn assess(&self, temperature: f64, ndvi: f64, nddi: f64) -> RiskAssessment {
        let temperature_factor = ((temperature - TEMP_BASELINE) / TEMP_SPAN).max(0.0);
        let vegetation_factor = (1.0 - ndvi).max(0.0);
        let dust_factor = (nddi + NDDI_OFFSET).max(0.0);

        let dust_risk_index = (DUST_WEIGHT * dust_factor
            + TEMP_WEIGHT * temperature_factor
            + VEG_WEIGHT * vegetation_factor)
            .clamp(0.0, 1.0);

        RiskAssessment {
            dust_risk_index,
            risk_level: self.classify(dust_risk_index),
            temperature_factor,
            vegetation_factor,
            dust_factor,
        }
    }

    pub fn assess_aggregates(&self, modis: &ModisAggregate, landsat: &LandsatAggregate) -> RiskAssessment {
        self.assess(modis.lst_day_mean, landsat.ndvi_mean, landsat.nddi_mean)
    }

    /// Thresholds are exclusive: an index equal to a threshold falls below it.
    pub fn classify(&self, index: f64) -> RiskLevel {
        if index > self.thresholds.dust_risk_high {
            RiskLevel::High
        } else if index > self.thresholds.dust_risk_moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn condition_status(&self, modis: &ModisAggregate, landsat: &LandsatAggregate) -> ConditionStatus {
        let temperature_status = if modis.lst_day_mean > self.thresholds.temperature_high {
            "High"
        } else if modis.lst_day_mean > TEMP_BASELINE {
            "Moderate"
        } else {
            "Low"
        };

        let vegetation_status = if landsat.ndvi_mean < LOW_VEGETATION_NDVI {
            "Low vegetation"
        } else if landsat.ndvi_mean < MODERATE_VEGETATION_NDVI {
            "Moderate vegetation"
        } else {
            "Good vegetation cover"
        };

        let dust_signature_status = if landsat.nddi_mean > self.thresholds.nddi_elevated {
            "Elevated dust signature detected"
        } else {
            "Normal dust levels"
        };

        ConditionStatus {
            temperature_status: temperature_status.into(),
            vegetation_status: vegetation_status.into(),
            dust_signature_status: dust_signature_status.into(),
        }
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}
