//! Configuration loader: merges .env, config.toml, and environment variables.

use common::config::MonitorConfig;
use common::Error;
use dust_engine::MAX_FORECAST_DAYS;
use std::path::Path;

fn parse_f64(raw: &str, env_name: &str) -> Result<f64, Error> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number")))
}

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

/// Look-back window accepted by the current-conditions analysis.
pub fn check_days_back(days_back: i64, name: &str) -> Result<(), String> {
    if days_back <= 0 {
        return Err(format!("{name} must be > 0"));
    }
    Ok(())
}

/// Forecast horizon accepted by the forecast model.
pub fn check_forecast_days(days: usize, name: &str) -> Result<(), String> {
    if days == 0 || days > MAX_FORECAST_DAYS {
        return Err(format!("{name} must be in 1..={MAX_FORECAST_DAYS}"));
    }
    Ok(())
}

fn validate_config(config: &MonitorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.project.trim().is_empty() {
        issues.push("project must not be empty".into());
    }

    let loc = &config.location;
    if !(-90.0..=90.0).contains(&loc.lat) {
        issues.push("location.lat must be in [-90,90]".into());
    }
    if !(-180.0..=180.0).contains(&loc.lon) {
        issues.push("location.lon must be in [-180,180]".into());
    }
    if loc.radius_m <= 0.0 {
        issues.push("location.radius_m must be > 0".into());
    }

    if config.cache.dir.trim().is_empty() {
        issues.push("cache.dir must not be empty".into());
    }
    if config.cache.default_ttl_minutes == 0 {
        issues.push("cache.default_ttl_minutes must be > 0".into());
    }
    for (name, minutes) in [
        ("ttl.modis_minutes", config.ttl.modis_minutes),
        ("ttl.landsat_minutes", config.ttl.landsat_minutes),
        ("ttl.risk_minutes", config.ttl.risk_minutes),
        ("ttl.forecast_minutes", config.ttl.forecast_minutes),
    ] {
        if minutes == 0 {
            issues.push(format!("{name} must be > 0"));
        }
    }

    let th = &config.thresholds;
    if !(0.0..=1.0).contains(&th.dust_risk_high) {
        issues.push("thresholds.dust_risk_high must be in [0,1]".into());
    }
    if !(0.0..=1.0).contains(&th.dust_risk_moderate) {
        issues.push("thresholds.dust_risk_moderate must be in [0,1]".into());
    }
    if th.dust_risk_moderate >= th.dust_risk_high {
        issues.push("thresholds.dust_risk_moderate must be < thresholds.dust_risk_high".into());
    }

    if config.timing.data_update_interval_minutes == 0 {
        issues.push("timing.data_update_interval_minutes must be > 0".into());
    }
    if config.timing.forecast_update_interval_minutes == 0 {
        issues.push("timing.forecast_update_interval_minutes must be > 0".into());
    }

    if let Err(issue) = check_days_back(config.analysis.days_back, "analysis.days_back") {
        issues.push(issue);
    }
    if let Err(issue) = check_forecast_days(config.analysis.forecast_days, "analysis.forecast_days") {
        issues.push(issue);
    }

    if config.backend.base_url.trim().is_empty() {
        issues.push("backend.base_url must not be empty".into());
    }
    if config.backend.timeout_secs == 0 {
        issues.push("backend.timeout_secs must be > 0".into());
    }
    if config.backend.requests_per_minute == 0 {
        issues.push("backend.requests_per_minute must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides read through `var`.
fn apply_env(
    config: &mut MonitorConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(project) = var("GOOGLE_CLOUD_PROJECT") {
        config.project = project;
    }
    if let Some(raw) = var("TASHKENT_LAT") {
        config.location.lat = parse_f64(&raw, "TASHKENT_LAT")?;
    }
    if let Some(raw) = var("TASHKENT_LON") {
        config.location.lon = parse_f64(&raw, "TASHKENT_LON")?;
    }

    if let Some(dir) = var("CACHE_DIR") {
        config.cache.dir = dir;
    }
    if let Some(raw) = var("CACHE_TTL_MINUTES") {
        config.cache.default_ttl_minutes = parse_positive_u64(&raw, "CACHE_TTL_MINUTES")?;
    }
    if let Some(raw) = var("ENABLE_CACHE") {
        config.cache.enabled = parse_bool(&raw);
    }

    if let Some(raw) = var("DUST_RISK_HIGH_THRESHOLD") {
        config.thresholds.dust_risk_high = parse_f64(&raw, "DUST_RISK_HIGH_THRESHOLD")?;
    }
    if let Some(raw) = var("DUST_RISK_MODERATE_THRESHOLD") {
        config.thresholds.dust_risk_moderate = parse_f64(&raw, "DUST_RISK_MODERATE_THRESHOLD")?;
    }
    if let Some(raw) = var("TEMPERATURE_HIGH_THRESHOLD") {
        config.thresholds.temperature_high = parse_f64(&raw, "TEMPERATURE_HIGH_THRESHOLD")?;
    }
    if let Some(raw) = var("NDDI_ELEVATED_THRESHOLD") {
        config.thresholds.nddi_elevated = parse_f64(&raw, "NDDI_ELEVATED_THRESHOLD")?;
    }

    if let Some(raw) = var("DATA_UPDATE_INTERVAL") {
        config.timing.data_update_interval_minutes =
            parse_positive_u64(&raw, "DATA_UPDATE_INTERVAL")?;
    }
    if let Some(raw) = var("FORECAST_UPDATE_INTERVAL") {
        config.timing.forecast_update_interval_minutes =
            parse_positive_u64(&raw, "FORECAST_UPDATE_INTERVAL")?;
    }

    if let Some(url) = var("EE_API_URL") {
        config.backend.base_url = url;
    }
    if let Some(token) = var("EE_ACCESS_TOKEN") {
        config.backend.access_token = token;
    }
    if let Some(raw) = var("EE_REQUESTS_PER_MINUTE") {
        let parsed = parse_positive_u64(&raw, "EE_REQUESTS_PER_MINUTE")?;
        config.backend.requests_per_minute = u32::try_from(parsed).map_err(|_| {
            Error::Config("EE_REQUESTS_PER_MINUTE is out of range".into())
        })?;
    }

    Ok(())
}

/// Load monitor configuration from `.env`, the optional config file, and
/// the environment, in increasing priority.
pub fn load_config(path: &Path) -> Result<MonitorConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, replaced by the config file if present.
    let mut config = MonitorConfig::default();
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
    }

    // 3. Environment variables win.
    apply_env(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&MonitorConfig::default()).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = MonitorConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("GOOGLE_CLOUD_PROJECT", "dust-watch"),
                ("TASHKENT_LAT", "41.3"),
                ("CACHE_DIR", "/var/cache/dustcast"),
                ("CACHE_TTL_MINUTES", "45"),
                ("ENABLE_CACHE", "false"),
                ("DUST_RISK_HIGH_THRESHOLD", "0.7"),
                ("FORECAST_UPDATE_INTERVAL", "120"),
                ("EE_REQUESTS_PER_MINUTE", "10"),
            ]),
        )
        .unwrap();

        assert_eq!(config.project, "dust-watch");
        assert_eq!(config.location.lat, 41.3);
        assert_eq!(config.cache.dir, "/var/cache/dustcast");
        assert_eq!(config.cache.default_ttl_minutes, 45);
        assert!(!config.cache.enabled);
        assert_eq!(config.thresholds.dust_risk_high, 0.7);
        assert_eq!(config.timing.forecast_update_interval_minutes, 120);
        assert_eq!(config.backend.requests_per_minute, 10);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = MonitorConfig::default();
        let err = apply_env(&mut config, env(&[("CACHE_TTL_MINUTES", "0")])).unwrap_err();
        assert!(err.to_string().contains("CACHE_TTL_MINUTES"));

        let err = apply_env(&mut config, env(&[("TASHKENT_LON", "east")])).unwrap_err();
        assert!(err.to_string().contains("TASHKENT_LON"));
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let mut config = MonitorConfig::default();
        config.location.lat = 120.0;
        config.thresholds.dust_risk_moderate = 0.8;
        config.analysis.forecast_days = 0;

        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("location.lat"));
        assert!(msg.contains("dust_risk_moderate"));
        assert!(msg.contains("analysis.forecast_days"));
    }

    #[test]
    fn test_analysis_window_bounds() {
        assert!(check_days_back(60, "--days-back").is_ok());
        assert_eq!(
            check_days_back(-30, "--days-back").unwrap_err(),
            "--days-back must be > 0"
        );
        assert!(check_forecast_days(MAX_FORECAST_DAYS, "--days").is_ok());
        assert!(check_forecast_days(0, "--days").is_err());
        assert!(check_forecast_days(150_000_000, "--days")
            .unwrap_err()
            .contains("--days must be in 1..="));

        let mut config = MonitorConfig::default();
        config.analysis.days_back = -1;
        config.analysis.forecast_days = MAX_FORECAST_DAYS + 1;
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("analysis.days_back must be > 0"));
        assert!(msg.contains("analysis.forecast_days must be in"));
    }

    #[test]
    fn test_toml_sections_parse() {
        let config: MonitorConfig = toml::from_str(
            r#"
            project = "dust-watch"

            [location]
            lat = 40.0

            [ttl]
            forecast_minutes = 240
            "#,
        )
        .unwrap();

        assert_eq!(config.location.lat, 40.0);
        assert_eq!(config.location.lon, 69.2401);
        assert_eq!(config.ttl.forecast_minutes, 240);
        assert_eq!(config.ttl.modis_minutes, 30);
        assert!(validate_config(&config).is_ok());
    }
}
