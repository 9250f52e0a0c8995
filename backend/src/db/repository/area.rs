//! Area repository: municipality boundaries and per-area aggregates.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::RepositoryResult;
use crate::db::spatial::SpatialFilter;
use crate::models::{AreaPolygon, Municipality, MunicipalityGeometry, TariffBucket};

#[async_trait]
pub trait AreaRepository: Send + Sync {
    /// All municipalities ordered by name.
    async fn list_municipalities(&self) -> RepositoryResult<Vec<Municipality>>;

    async fn get_municipality_geometry(
        &self,
        name: &str,
    ) -> RepositoryResult<Option<MunicipalityGeometry>>;

    /// Geodesic perimeter of a municipality boundary in km, `None` when the
    /// municipality has no boundary row.
    async fn municipality_perimeter_km(&self, name: &str) -> RepositoryResult<Option<f64>>;

    /// Geodesic perimeter of a drawn polygon in km.
    async fn polygon_perimeter_km(&self, polygon: &AreaPolygon) -> RepositoryResult<f64>;

    async fn count_installations(&self, filter: &SpatialFilter) -> RepositoryResult<i64>;

    /// Distinct installations inside `filter` with a fraud dated on or after `since`.
    async fn count_fraud_installations(
        &self,
        filter: &SpatialFilter,
        since: NaiveDate,
    ) -> RepositoryResult<i64>;

    /// Installation counts per tariff class; a missing class is reported as
    /// [`UNCLASSIFIED_TARIFF`](crate::models::UNCLASSIFIED_TARIFF). Order is
    /// not significant.
    async fn tariff_distribution(&self, filter: &SpatialFilter)
        -> RepositoryResult<Vec<TariffBucket>>;
}
