//! Geospatial analytics backend client.
//!
//! The dust pipeline needs exactly one kind of remote call: reduce a set of
//! derived raster bands to region-wide statistics over a date range. That
//! call sits behind [`RegionReducer`] so the pipeline can be driven by the
//! HTTP gateway client here or by an in-process fake.

pub mod rate_limit;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use common::config::{BackendConfig, LocationConfig};
use common::Error;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use rate_limit::RateLimiter;

// ── Query types ───────────────────────────────────────────────────────

/// Circular analysis region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// `[lon, lat]`.
    pub center: [f64; 2],
    pub radius_m: f64,
}

impl Region {
    pub fn around(location: &LocationConfig) -> Self {
        Self {
            center: location.coordinates(),
            radius_m: location.radius_m,
        }
    }
}

/// Image-property filter applied before compositing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub op: FilterOp,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Lt,
}

/// How the filtered collection is collapsed into one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composite {
    Median,
}

/// A derived band computed on the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BandExpr {
    /// `source * scale + offset`, renamed to `name`.
    Linear {
        name: String,
        source: String,
        scale: f64,
        offset: f64,
    },
    /// `(a - b) / (a + b)`, renamed to `name`.
    NormalizedDifference { name: String, a: String, b: String },
}

impl BandExpr {
    pub fn name(&self) -> &str {
        match self {
            BandExpr::Linear { name, .. } | BandExpr::NormalizedDifference { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Mean,
    StdDev,
}

impl Reducer {
    /// Output-name suffix the backend appends to each band.
    pub fn suffix(&self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::StdDev => "stdDev",
        }
    }
}

/// Name of the statistic the backend reports for `band` under `reducer`.
pub fn stat_key(band: &str, reducer: Reducer) -> String {
    format!("{}_{}", band, reducer.suffix())
}

/// One reduce-region request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionQuery {
    /// Collections merged before filtering.
    pub collections: Vec<String>,
    /// Inclusive start, `YYYY-MM-DD`.
    pub start_date: String,
    /// Exclusive end, `YYYY-MM-DD`.
    pub end_date: String,
    pub region: Region,
    #[serde(default)]
    pub filters: Vec<PropertyFilter>,
    pub composite: Composite,
    pub bands: Vec<BandExpr>,
    pub reducers: Vec<Reducer>,
    /// Nominal pixel scale in meters.
    pub scale_m: f64,
    pub max_pixels: f64,
}

/// Region-wide statistics plus the number of source images used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionReduction {
    /// Keyed by [`stat_key`]; `null` when a band had no valid pixels.
    #[serde(default)]
    pub stats: HashMap<String, Option<f64>>,
    #[serde(default)]
    pub image_count: u64,
}

impl RegionReduction {
    pub fn stat(&self, band: &str, reducer: Reducer) -> Option<f64> {
        self.stats.get(&stat_key(band, reducer)).copied().flatten()
    }
}

/// Anything that can answer reduce-region queries.
#[async_trait]
pub trait RegionReducer: Send + Sync {
    async fn reduce_region(&self, query: &RegionQuery) -> common::Result<RegionReduction>;
}

// ── HTTP gateway client ───────────────────────────────────────────────

/// Rate-limited client for the reduce-region gateway.
#[derive(Debug, Clone)]
pub struct EarthEngineClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    limiter: RateLimiter,
}

impl EarthEngineClient {
    pub fn new(config: &BackendConfig, project: &str) -> common::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("dustcast/0.1 (dust storm monitor)")
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build backend HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/projects/{}/reduceRegion",
                config.base_url.trim_end_matches('/'),
                project
            ),
            access_token: config.access_token.clone(),
            limiter: RateLimiter::per_minute(config.requests_per_minute),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RegionReducer for EarthEngineClient {
    async fn reduce_region(&self, query: &RegionQuery) -> common::Result<RegionReduction> {
        self.limiter.wait().await;

        debug!(
            "Reducing {:?} {}..{} at {}m",
            query.collections, query.start_date, query.end_date, query.scale_m
        );

        let mut request = self.client.post(&self.endpoint).json(query);
        if !self.access_token.is_empty() {
            request = request.bearer_auth(&self.access_token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Error::Backend(format!("HTTP error for {:?}: {}", query.collections, e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Backend(format!(
                "backend returned {} for {:?}: {}",
                status,
                query.collections,
                body.chars().take(500).collect::<String>()
            )));
        }

        let reduction: RegionReduction = resp
            .json()
            .await
            .map_err(|e| Error::Backend(format!("JSON parse error: {e}")))?;

        debug!(
            "Got {} statistics from {} images",
            reduction.stats.len(),
            reduction.image_count
        );

        Ok(reduction)
    }
}
