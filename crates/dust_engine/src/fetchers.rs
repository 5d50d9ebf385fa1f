//! Remote aggregate fetchers.
//!
//! Each fetcher builds one reduce-region query for the monitored region and
//! a `(start, end)` date pair, and is memoized under its own TTL tier.

use std::sync::Arc;

use common::config::LocationConfig;
use common::{Error, LandsatAggregate, ModisAggregate};
use earth_engine_client::{
    stat_key, BandExpr, Composite, FilterOp, PropertyFilter, Reducer, Region, RegionQuery,
    RegionReducer, RegionReduction,
};
use smart_cache::Memoizer;
use tracing::{info, warn};

use crate::TtlPolicies;

pub const MODIS_COLLECTION: &str = "MODIS/061/MOD11A1";
pub const LANDSAT_COLLECTIONS: [&str; 2] = ["LANDSAT/LC08/C02/T1_L2", "LANDSAT/LC09/C02/T1_L2"];

const LST_BAND: &str = "LST_Day_1km";
/// MODIS LST is stored as Kelvin / 0.02.
const LST_SCALE: f64 = 0.02;
const KELVIN_OFFSET: f64 = -273.15;
const MAX_CLOUD_COVER: f64 = 20.0;
const SCALE_M: f64 = 1000.0;
const MAX_PIXELS: f64 = 1e9;

pub fn modis_query(location: &LocationConfig, start: &str, end: &str) -> RegionQuery {
    RegionQuery {
        collections: vec![MODIS_COLLECTION.into()],
        start_date: start.into(),
        end_date: end.into(),
        region: Region::around(location),
        filters: Vec::new(),
        composite: Composite::Median,
        bands: vec![BandExpr::Linear {
            name: LST_BAND.into(),
            source: LST_BAND.into(),
            scale: LST_SCALE,
            offset: KELVIN_OFFSET,
        }],
        reducers: vec![Reducer::Mean, Reducer::StdDev],
        scale_m: SCALE_M,
        max_pixels: MAX_PIXELS,
    }
}

pub fn landsat_query(location: &LocationConfig, start: &str, end: &str) -> RegionQuery {
    RegionQuery {
        collections: LANDSAT_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
        start_date: start.into(),
        end_date: end.into(),
        region: Region::around(location),
        filters: vec![PropertyFilter {
            property: "CLOUD_COVER".into(),
            op: FilterOp::Lt,
            value: MAX_CLOUD_COVER,
        }],
        composite: Composite::Median,
        bands: vec![
            BandExpr::NormalizedDifference {
                name: "NDVI".into(),
                a: "SR_B5".into(),
                b: "SR_B4".into(),
            },
            BandExpr::NormalizedDifference {
                name: "NDDI".into(),
                a: "SR_B6".into(),
                b: "SR_B5".into(),
            },
        ],
        reducers: vec![Reducer::Mean, Reducer::StdDev],
        scale_m: SCALE_M,
        max_pixels: MAX_PIXELS,
    }
}

/// Missing statistics read as 0.0 rather than failing the pipeline.
fn stat_or_zero(reduction: &RegionReduction, band: &str, reducer: Reducer) -> f64 {
    match reduction.stat(band, reducer) {
        Some(v) => v,
        None => {
            warn!("{} missing from reduction, defaulting to 0.0", stat_key(band, reducer));
            0.0
        }
    }
}

pub fn modis_from_reduction(reduction: &RegionReduction) -> ModisAggregate {
    ModisAggregate {
        lst_day_mean: stat_or_zero(reduction, LST_BAND, Reducer::Mean),
        lst_day_std: stat_or_zero(reduction, LST_BAND, Reducer::StdDev),
        modis_count: reduction.image_count,
    }
}

pub fn landsat_from_reduction(reduction: &RegionReduction) -> LandsatAggregate {
    LandsatAggregate {
        ndvi_mean: stat_or_zero(reduction, "NDVI", Reducer::Mean),
        ndvi_std: stat_or_zero(reduction, "NDVI", Reducer::StdDev),
        nddi_mean: stat_or_zero(reduction, "NDDI", Reducer::Mean),
        nddi_std: stat_or_zero(reduction, "NDDI", Reducer::StdDev),
        landsat_count: reduction.image_count,
    }
}

/// Memoized MODIS and Landsat fetchers for one location.
#[derive(Clone)]
pub struct DataFetchers {
    backend: Arc<dyn RegionReducer>,
    memo: Memoizer,
    policies: TtlPolicies,
    location: LocationConfig,
}

impl DataFetchers {
    pub fn new(
        backend: Arc<dyn RegionReducer>,
        memo: Memoizer,
        policies: TtlPolicies,
        location: LocationConfig,
    ) -> Self {
        Self {
            backend,
            memo,
            policies,
            location,
        }
    }

    /// Land-surface temperature aggregate for `[start, end)`.
    pub async fn modis(&self, start: &str, end: &str) -> Result<ModisAggregate, Error> {
        self.memo
            .run(&self.policies.modis, |k| k.arg(start).arg(end), || async {
                info!("Fetching MODIS LST data...");
                let query = modis_query(&self.location, start, end);
                let reduction = self.backend.reduce_region(&query).await?;
                Ok::<_, Error>(modis_from_reduction(&reduction))
            })
            .await
    }

    /// Vegetation and dust-index aggregate for `[start, end)`.
    pub async fn landsat(&self, start: &str, end: &str) -> Result<LandsatAggregate, Error> {
        self.memo
            .run(&self.policies.landsat, |k| k.arg(start).arg(end), || async {
                info!("Fetching Landsat data...");
                let query = landsat_query(&self.location, start, end);
                let reduction = self.backend.reduce_region(&query).await?;
                Ok::<_, Error>(landsat_from_reduction(&reduction))
            })
            .await
    }
}
