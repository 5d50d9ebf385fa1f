//! Dust analyzer: the orchestration boundary.
//!
//! Everything below this point returns `Result`; everything the analyzer
//! hands out is an [`Envelope`] so callers never see an error escape.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use common::{
    CacheStatsSnapshot, ClearReport, ConditionsSnapshot, Envelope, Error, FailureReport,
    ForecastDay, HealthReport, MonitorConfig, SystemStatus,
};
use earth_engine_client::RegionReducer;
use smart_cache::{CacheStore, Memoizer};
use tracing::{error, info};

use crate::entropy::{EntropySource, RngEntropy};
use crate::fetchers::DataFetchers;
use crate::forecast::{build_forecast, ForecastBase, MAX_FORECAST_DAYS};
use crate::risk::RiskEngine;
use crate::{round_to, TtlPolicies};

pub struct DustAnalyzer {
    config: MonitorConfig,
    store: Arc<CacheStore>,
    memo: Memoizer,
    fetchers: DataFetchers,
    risk: RiskEngine,
    policies: TtlPolicies,
    entropy: Mutex<Box<dyn EntropySource>>,
}

impl DustAnalyzer {
    /// Build the analyzer and sweep entries past the store default TTL.
    pub fn new(
        config: MonitorConfig,
        store: Arc<CacheStore>,
        backend: Arc<dyn RegionReducer>,
    ) -> Self {
        let memo = Memoizer::new(Arc::clone(&store)).with_enabled(config.cache.enabled);
        let policies = TtlPolicies::from(&config.ttl);
        let fetchers = DataFetchers::new(
            backend,
            memo.clone(),
            policies.clone(),
            config.location.clone(),
        );

        store.clear_expired();

        info!(
            "Dust analyzer ready for {} (cache {})",
            config.location.display_name,
            if memo.is_enabled() { "enabled" } else { "disabled" }
        );

        Self {
            risk: RiskEngine::new(config.thresholds.clone()),
            config,
            store,
            memo,
            fetchers,
            policies,
            entropy: Mutex::new(Box::new(RngEntropy::from_os())),
        }
    }

    /// Replace the forecast noise source.
    pub fn with_entropy(mut self, entropy: impl EntropySource + 'static) -> Self {
        self.entropy = Mutex::new(Box::new(entropy));
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        self.store.clock().now().date_naive()
    }

    fn failure(&self, error: &Error, started: Instant) -> FailureReport {
        FailureReport {
            error: error.to_string(),
            execution_time_seconds: round_to(started.elapsed().as_secs_f64(), 2),
            cache_stats: self.store.stats(),
        }
    }

    // ── Current conditions ────────────────────────────────────────────

    pub async fn current_conditions(&self, days_back: i64) -> Envelope<ConditionsSnapshot> {
        let started = Instant::now();
        match self.try_current_conditions(days_back).await {
            Ok(snapshot) => Envelope::Success(snapshot),
            Err(e) => {
                error!("Analysis error: {}", e);
                Envelope::Failure(self.failure(&e, started))
            }
        }
    }

    pub async fn try_current_conditions(&self, days_back: i64) -> Result<ConditionsSnapshot, Error> {
        let started = Instant::now();
        if days_back <= 0 {
            return Err(Error::Other(format!("days_back must be > 0, got {days_back}")));
        }
        let today = self.today();
        let start = today
            .checked_sub_days(Days::new(days_back.unsigned_abs()))
            .ok_or_else(|| Error::Other(format!("days_back {days_back} is out of range")))?
            .format("%Y-%m-%d")
            .to_string();
        let end = today.format("%Y-%m-%d").to_string();

        info!("Analyzing period: {} to {}", start, end);

        let (modis, landsat) = tokio::try_join!(
            self.fetchers.modis(&start, &end),
            self.fetchers.landsat(&start, &end)
        )?;

        let risk = self
            .memo
            .run(&self.policies.risk, |k| k.json_arg(&modis).json_arg(&landsat), || async {
                Ok::<_, Error>(self.risk.assess_aggregates(&modis, &landsat))
            })
            .await?;

        let snapshot = ConditionsSnapshot {
            timestamp: self.store.clock().now(),
            analysis_period_days: days_back,
            execution_time_seconds: round_to(started.elapsed().as_secs_f64(), 2),
            data_sources: format!(
                "MODIS_LST_{},Landsat_{}",
                modis.modis_count, landsat.landsat_count
            ),
            status: self.risk.condition_status(&modis, &landsat),
            modis,
            landsat,
            risk,
            location: self.config.location.name.clone(),
            coordinates: self.config.location.coordinates(),
            cache_stats: self.store.stats(),
        };

        info!(
            "Analysis complete in {}s - Risk: {}",
            snapshot.execution_time_seconds,
            snapshot.risk.risk_level.as_str().to_uppercase()
        );

        Ok(snapshot)
    }

    // ── Forecast ──────────────────────────────────────────────────────

    pub async fn forecast(&self, days: usize) -> Envelope<Vec<ForecastDay>> {
        let started = Instant::now();
        match self.try_forecast(days).await {
            Ok(forecast) => Envelope::Success(forecast),
            Err(e) => {
                error!("Forecast error: {}", e);
                Envelope::Failure(self.failure(&e, started))
            }
        }
    }

    /// Cached as a unit under its own TTL. The base conditions inside are
    /// cached on shorter tiers, so a cached forecast can outlive its inputs.
    pub async fn try_forecast(&self, days: usize) -> Result<Vec<ForecastDay>, Error> {
        if days == 0 || days > MAX_FORECAST_DAYS {
            return Err(Error::Other(format!(
                "days must be in 1..={MAX_FORECAST_DAYS}, got {days}"
            )));
        }

        self.memo
            .run(&self.policies.forecast, |k| k.kwarg("days", days), || async {
                let current = self
                    .try_current_conditions(self.config.analysis.days_back)
                    .await?;
                let base = ForecastBase {
                    base_risk: current.risk.dust_risk_index,
                    base_temp: current.modis.lst_day_mean,
                };

                let forecast = {
                    let mut entropy = self.entropy.lock().unwrap_or_else(|e| e.into_inner());
                    build_forecast(&base, self.today(), days, &mut **entropy)
                };

                if !forecast.is_empty() {
                    let avg = forecast.iter().map(|d| d.risk_score).sum::<f64>()
                        / forecast.len() as f64;
                    info!("Generated {}-day forecast with avg risk: {:.3}", days, avg);
                }

                Ok::<_, Error>(forecast)
            })
            .await
    }

    // ── Cache and status ──────────────────────────────────────────────

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.store.stats()
    }

    pub fn clear_cache(&self) -> Envelope<ClearReport> {
        let started = Instant::now();
        match self.store.clear_all() {
            Ok(cleared_files) => Envelope::Success(ClearReport {
                cleared_files,
                message: format!("Cache cleared successfully. Removed {cleared_files} files."),
            }),
            Err(e) => {
                error!("Cache clear failed: {}", e);
                Envelope::Failure(self.failure(&e, started))
            }
        }
    }

    pub fn clear_expired(&self) -> usize {
        self.store.clear_expired()
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            status: "online".into(),
            project: self.config.project.clone(),
            timestamp: self.store.clock().now(),
            location: self.config.location.display_name.clone(),
            coordinates: self.config.location.coordinates(),
            cache_performance: self.store.stats(),
            cache_enabled: self.memo.is_enabled(),
            cache_ttl_minutes: ttl_minutes(self.store.default_ttl()),
        }
    }

    pub fn health(&self) -> HealthReport {
        let cache_healthy = self.store.is_healthy();
        HealthReport {
            status: if cache_healthy { "healthy" } else { "unhealthy" }.into(),
            timestamp: self.store.clock().now(),
            cache_healthy,
        }
    }
}

fn ttl_minutes(ttl: Duration) -> u64 {
    ttl.as_secs() / 60
}
