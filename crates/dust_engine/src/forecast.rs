//! Synthetic multi-day forecast projected from current conditions.
//!
//! Each day combines the current risk with a seasonal sine, a weekly sine,
//! a noise term that widens with lead time, and a season-dependent trend.
//! Temperature is projected the same way and clamped to 15..=45 °C.

use std::f64::consts::TAU;

use chrono::{Datelike, Days, NaiveDate};
use common::{ForecastDay, RiskLevel, Tendency};

use crate::entropy::EntropySource;
use crate::round_to;

pub const DEFAULT_FORECAST_DAYS: usize = 7;
/// Longest horizon the model projects; confidence has bottomed out by then.
pub const MAX_FORECAST_DAYS: usize = 30;

const RISK_FLOOR: f64 = 0.05;
const RISK_CEILING: f64 = 0.95;
const HIGH_RISK: f64 = 0.65;
const MODERATE_RISK: f64 = 0.35;
const MIN_TEMP: f64 = 15.0;
const MAX_TEMP: f64 = 45.0;
const MIN_CONFIDENCE: f64 = 0.35;
/// Day-to-day change in risk needed to call a tendency.
const TENDENCY_STEP: f64 = 0.1;

/// Inputs taken from the current conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastBase {
    pub base_risk: f64,
    pub base_temp: f64,
}

fn seasonal_phase(date: NaiveDate) -> f64 {
    (date.ordinal() as f64 / 365.0 * TAU).sin()
}

fn risk_level(score: f64) -> RiskLevel {
    if score > HIGH_RISK {
        RiskLevel::High
    } else if score > MODERATE_RISK {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

pub fn confidence(day_index: usize) -> f64 {
    let i = day_index as f64;
    let raw = match day_index {
        0 => 0.95,
        1..=2 => 0.85 - i * 0.05,
        3..=4 => 0.75 - (i - 2.0) * 0.08,
        _ => 0.59 - (i - 4.0) * 0.06,
    };
    raw.max(MIN_CONFIDENCE)
}

fn tendency(score: f64, previous: Option<f64>) -> Tendency {
    match previous {
        None => Tendency::Current,
        Some(prev) if score > prev + TENDENCY_STEP => Tendency::Increasing,
        Some(prev) if score < prev - TENDENCY_STEP => Tendency::Decreasing,
        Some(_) => Tendency::Stable,
    }
}

fn day_name(date: NaiveDate, day_index: usize) -> String {
    match day_index {
        0 => "Today".into(),
        1 => "Tomorrow".into(),
        _ => date.format("%A").to_string(),
    }
}

/// Project `days` forecast days starting at `today`.
///
/// At most [`MAX_FORECAST_DAYS`] are produced, and the run stops early at
/// the end of the calendar. Draws two samples per day from `entropy`: risk
/// noise, then temperature noise.
pub fn build_forecast(
    base: &ForecastBase,
    today: NaiveDate,
    days: usize,
    entropy: &mut dyn EntropySource,
) -> Vec<ForecastDay> {
    let days = days.min(MAX_FORECAST_DAYS);
    let mut forecast: Vec<ForecastDay> = Vec::with_capacity(days);

    for i in 0..days {
        let Some(date) = today.checked_add_days(Days::new(i as u64)) else {
            break;
        };
        let lead = i as f64;
        let phase = seasonal_phase(date);
        let month = date.month();

        let seasonal = phase * 0.08;
        let weekly = (lead / 7.0 * TAU).sin() * 0.05;
        let noise = (entropy.next_unit() - 0.5) * (0.1 + lead * 0.02);
        let trend = if (6..=9).contains(&month) { lead * 0.01 } else { lead * 0.005 };
        let risk_score =
            (base.base_risk + seasonal + weekly + noise + trend).clamp(RISK_FLOOR, RISK_CEILING);

        let temp_seasonal = phase * 8.0;
        let temp_noise = (entropy.next_unit() - 0.5) * 5.0;
        let temp_trend = if (9..=11).contains(&month) { -0.2 * lead } else { 0.1 * lead };
        let temperature =
            (base.base_temp + temp_seasonal + temp_noise + temp_trend).clamp(MIN_TEMP, MAX_TEMP);

        let previous = forecast.last().map(|d| d.risk_score);

        forecast.push(ForecastDay {
            date: date.format("%Y-%m-%d").to_string(),
            day_name: day_name(date, i),
            day_short: date.format("%a").to_string(),
            risk_score,
            risk_level: risk_level(risk_score),
            temperature: round_to(temperature, 1),
            confidence: confidence(i),
            tendency: tendency(risk_score, previous),
            day_index: i,
        });
    }

    forecast
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{ConstantEntropy, RngEntropy};

    const BASE: ForecastBase = ForecastBase {
        base_risk: 0.465,
        base_temp: 30.0,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_zero_is_today() {
        for seed in 0..5 {
            let days = build_forecast(&BASE, day(2025, 7, 14), 3, &mut RngEntropy::seeded(seed));
            assert_eq!(days[0].day_name, "Today");
            assert_eq!(days[0].confidence, 0.95);
            assert_eq!(days[0].tendency, Tendency::Current);
            assert_eq!(days[0].date, "2025-07-14");
            assert_eq!(days[1].day_name, "Tomorrow");
        }
    }

    #[test]
    fn test_length_and_indices() {
        let days = build_forecast(&BASE, day(2025, 1, 30), 10, &mut ConstantEntropy(0.5));
        assert_eq!(days.len(), 10);
        for (i, d) in days.iter().enumerate() {
            assert_eq!(d.day_index, i);
        }
        assert_eq!(days[2].date, "2025-02-01");
        assert_eq!(days[2].day_name, "Saturday");
        assert_eq!(days[2].day_short, "Sat");
        assert!(build_forecast(&BASE, day(2025, 1, 30), 0, &mut ConstantEntropy(0.5)).is_empty());
    }

    #[test]
    fn test_horizon_is_capped() {
        let days = build_forecast(&BASE, day(2025, 7, 14), 150_000_000, &mut ConstantEntropy(0.5));
        assert_eq!(days.len(), MAX_FORECAST_DAYS);
        assert_eq!(days.last().unwrap().day_index, MAX_FORECAST_DAYS - 1);
    }

    #[test]
    fn test_stops_at_end_of_calendar() {
        let last = NaiveDate::MAX.pred_opt().unwrap().pred_opt().unwrap();
        let days = build_forecast(&BASE, last, 7, &mut ConstantEntropy(0.5));
        assert_eq!(days.len(), 3);
        assert_eq!(days[2].date, NaiveDate::MAX.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_confidence_decay() {
        let expected = [0.95, 0.80, 0.75, 0.67, 0.59, 0.53, 0.47, 0.41, 0.35, 0.35];
        for (i, want) in expected.iter().enumerate() {
            assert!((confidence(i) - want).abs() < 1e-9, "day {i}");
        }
    }

    #[test]
    fn test_bounds_hold_for_extreme_inputs() {
        let hot = ForecastBase {
            base_risk: 5.0,
            base_temp: 90.0,
        };
        let cold = ForecastBase {
            base_risk: -5.0,
            base_temp: -40.0,
        };
        for d in build_forecast(&hot, day(2025, 8, 1), 7, &mut RngEntropy::seeded(1)) {
            assert_eq!(d.risk_score, 0.95);
            assert_eq!(d.temperature, 45.0);
            assert_eq!(d.risk_level, RiskLevel::High);
        }
        for d in build_forecast(&cold, day(2025, 8, 1), 7, &mut RngEntropy::seeded(1)) {
            assert_eq!(d.risk_score, 0.05);
            assert_eq!(d.temperature, 15.0);
            assert_eq!(d.risk_level, RiskLevel::Low);
        }
    }

    #[test]
    fn test_flat_noise_is_deterministic() {
        // Day 0 on the 365th day of the year: phase is sin(2π) ~ 0.
        let days = build_forecast(&BASE, day(2025, 12, 31), 1, &mut ConstantEntropy(0.5));
        assert!((days[0].risk_score - 0.465).abs() < 1e-9);
        assert_eq!(days[0].temperature, 30.0);
    }

    #[test]
    fn test_tendency_follows_previous_day() {
        assert_eq!(tendency(0.5, None), Tendency::Current);
        assert_eq!(tendency(0.61, Some(0.5)), Tendency::Increasing);
        assert_eq!(tendency(0.39, Some(0.5)), Tendency::Decreasing);
        assert_eq!(tendency(0.55, Some(0.5)), Tendency::Stable);
    }

    #[test]
    fn test_seeded_forecast_reproducible() {
        let a = build_forecast(&BASE, day(2025, 6, 1), 7, &mut RngEntropy::seeded(42));
        let b = build_forecast(&BASE, day(2025, 6, 1), 7, &mut RngEntropy::seeded(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_temperature_one_decimal() {
        for d in build_forecast(&BASE, day(2025, 3, 10), 7, &mut RngEntropy::seeded(9)) {
            assert!(((d.temperature * 10.0).round() - d.temperature * 10.0).abs() < 1e-6);
        }
    }
}
