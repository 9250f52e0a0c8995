//! High-level database service layer.
//!
//! Repository-agnostic operations behind every HTTP endpoint. These functions
//! own the rules that must hold regardless of the storage backend: 404 on
//! unknown queries, limit clamping, the fraud window, GeoJSON shaping and
//! status validation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  HTTP handlers (http/handlers.rs)                       │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services.rs)                            │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/)                        │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴────────────────┐
//! ┌───▼──────────────────┐   ┌─────────▼───────────┐
//! │ Postgres Repository  │   │ Local Repository    │
//! │ (PostGIS SQL)        │   │ (in-memory + geo)   │
//! └──────────────────────┘   └─────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::repository::{ErrorContext, FullRepository, RepositoryError, RepositoryResult};
use super::spatial::SpatialFilter;
use crate::api::{
    AuxiliaryResultProperties, AuxiliaryResults, AuxiliaryResultsMetadata, MainResultProperties,
    MainResults, MainResultsMetadata, MunicipalityFeature, MunicipalityProperties,
};
use crate::models::*;

/// Consumption periods returned when no `limit` is given.
pub const DEFAULT_CONSUMPTION_LIMIT: i64 = 12;
/// Service notes returned when no `limit` is given.
pub const DEFAULT_SERVICE_NOTES_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 1000;

/// Clamp a caller-supplied `limit` into `[1, MAX_LIMIT]`.
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

fn installation_not_found(operation: &str, installation_id: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        format!("Installation {} not found", installation_id),
        ErrorContext::new(operation)
            .with_entity("installation")
            .with_entity_id(installation_id),
    )
}

// ==================== Health & Connection ====================

pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

// ==================== Queries ====================

pub async fn list_main_queries<R: FullRepository + ?Sized>(
    repo: &R,
) -> RepositoryResult<Vec<MainQuery>> {
    repo.list_main_queries().await
}

pub async fn list_auxiliary_queries<R: FullRepository + ?Sized>(
    repo: &R,
) -> RepositoryResult<Vec<AuxiliaryQuery>> {
    repo.list_auxiliary_queries().await
}

/// Main-query results as a FeatureCollection, optionally restricted to a
/// viewport envelope.
///
/// # Errors
/// * `RepositoryError::NotFound` if the query does not exist
pub async fn get_main_query_results<R: FullRepository + ?Sized>(
    repo: &R,
    query_id: MainQueryId,
    bounds: Option<BoundingBox>,
) -> RepositoryResult<MainResults> {
    let query = repo.get_main_query(query_id).await?.ok_or_else(|| {
        RepositoryError::not_found_with_context(
            format!("Main query {} not found", query_id),
            ErrorContext::new("get_main_query_results")
                .with_entity("main_query")
                .with_entity_id(query_id),
        )
    })?;

    let filter = SpatialFilter::from_bounds(bounds);
    let hits = repo.fetch_main_query_results(query_id, &filter).await?;
    debug!(
        "Main query {} returned {} results (filter={:?})",
        query_id,
        hits.len(),
        filter
    );

    let features: Vec<_> = hits
        .into_iter()
        .map(|hit| {
            Feature::new(
                Geometry::point(hit.longitude, hit.latitude),
                MainResultProperties {
                    installation_id: hit.installation_id,
                    municipality: hit.municipality,
                    tariff_class: hit.tariff_class,
                    target_type: hit.target_type,
                    score: hit.score,
                    query_id: query.id,
                    query_name: query.name.clone(),
                    query_color: query.color.clone(),
                },
            )
        })
        .collect();

    let metadata = MainResultsMetadata {
        query_id: query.id,
        query_name: query.name,
        query_color: query.color,
        total_results: features.len(),
    };
    Ok(FeatureCollection::new(features, metadata))
}

/// Auxiliary-query results restricted to the selected area.
///
/// # Errors
/// * `RepositoryError::NotFound` if the query does not exist
pub async fn get_auxiliary_query_results<R: FullRepository + ?Sized>(
    repo: &R,
    query_id: AuxiliaryQueryId,
    area: &AreaSelection,
) -> RepositoryResult<AuxiliaryResults> {
    let query = repo.get_auxiliary_query(query_id).await?.ok_or_else(|| {
        RepositoryError::not_found_with_context(
            format!("Auxiliary query {} not found", query_id),
            ErrorContext::new("get_auxiliary_query_results")
                .with_entity("auxiliary_query")
                .with_entity_id(query_id),
        )
    })?;

    let filter = SpatialFilter::from(area);
    let hits = repo.fetch_auxiliary_query_results(query_id, &filter).await?;
    debug!(
        "Auxiliary query {} returned {} results for {} area",
        query_id,
        hits.len(),
        area.kind()
    );

    let features: Vec<_> = hits
        .into_iter()
        .map(|hit| {
            Feature::new(
                Geometry::point(hit.longitude, hit.latitude),
                AuxiliaryResultProperties {
                    installation_id: hit.installation_id,
                    municipality: hit.municipality,
                    tariff_class: hit.tariff_class,
                    return_type: query.return_type,
                    intensity: hit.intensity,
                    query_id: query.id,
                    query_name: query.name.clone(),
                },
            )
        })
        .collect();

    let metadata = AuxiliaryResultsMetadata {
        query_id: query.id,
        query_name: query.name,
        return_type: query.return_type,
        area_type: area.kind(),
        total_results: features.len(),
    };
    Ok(FeatureCollection::new(features, metadata))
}

// ==================== Areas ====================

pub async fn list_municipalities<R: FullRepository + ?Sized>(
    repo: &R,
) -> RepositoryResult<Vec<Municipality>> {
    repo.list_municipalities().await
}

pub async fn get_municipality_feature<R: FullRepository + ?Sized>(
    repo: &R,
    name: &str,
) -> RepositoryResult<MunicipalityFeature> {
    let municipality = repo.get_municipality_geometry(name).await?.ok_or_else(|| {
        RepositoryError::not_found_with_context(
            format!("Municipality {} not found", name),
            ErrorContext::new("get_municipality_feature")
                .with_entity("municipality")
                .with_entity_id(name),
        )
    })?;
    Ok(Feature::new(
        municipality.geometry,
        MunicipalityProperties {
            id: municipality.id,
            name: municipality.name,
        },
    ))
}

/// Area metrics evaluated now.
pub async fn compute_area_metrics<R: FullRepository + ?Sized>(
    repo: &R,
    area: &AreaSelection,
) -> RepositoryResult<AreaMetrics> {
    compute_area_metrics_at(repo, area, Utc::now()).await
}

/// Area metrics with the fraud window ending at `now`.
pub async fn compute_area_metrics_at<R: FullRepository + ?Sized>(
    repo: &R,
    area: &AreaSelection,
    now: DateTime<Utc>,
) -> RepositoryResult<AreaMetrics> {
    let perimeter_km = match area {
        AreaSelection::Municipality(name) => repo.municipality_perimeter_km(name).await?,
        AreaSelection::Polygon(polygon) => Some(repo.polygon_perimeter_km(polygon).await?),
    };

    let filter = SpatialFilter::from(area);
    let total_installations = repo.count_installations(&filter).await?;
    let fraud_installations_5y = repo
        .count_fraud_installations(&filter, fraud_window_start(now))
        .await?;
    let mut tariff_distribution = repo.tariff_distribution(&filter).await?;
    sort_tariff_distribution(&mut tariff_distribution);

    Ok(AreaMetrics {
        perimeter_km,
        total_installations,
        fraud_installations_5y,
        tariff_distribution,
    })
}

// ==================== Installations ====================

/// # Errors
/// * `RepositoryError::NotFound` if the installation does not exist
pub async fn get_installation<R: FullRepository + ?Sized>(
    repo: &R,
    installation_id: &str,
) -> RepositoryResult<Installation> {
    repo.get_installation(installation_id)
        .await?
        .ok_or_else(|| installation_not_found("get_installation", installation_id))
}

/// The most recent `limit` periods in chronological order.
pub async fn get_consumption_history<R: FullRepository + ?Sized>(
    repo: &R,
    installation_id: &str,
    limit: Option<i64>,
) -> RepositoryResult<Vec<ConsumptionRecord>> {
    let limit = clamp_limit(limit, DEFAULT_CONSUMPTION_LIMIT);
    let mut rows = repo.fetch_consumption(installation_id, limit).await?;
    rows.reverse();
    Ok(rows)
}

pub async fn get_fraud_history<R: FullRepository + ?Sized>(
    repo: &R,
    installation_id: &str,
) -> RepositoryResult<Vec<FraudRecord>> {
    repo.fetch_frauds(installation_id).await
}

pub async fn get_service_notes<R: FullRepository + ?Sized>(
    repo: &R,
    installation_id: &str,
    limit: Option<i64>,
) -> RepositoryResult<Vec<ServiceNote>> {
    let limit = clamp_limit(limit, DEFAULT_SERVICE_NOTES_LIMIT);
    repo.fetch_service_notes(installation_id, limit).await
}

// ==================== Status ====================

/// Append a status row. No transition rules apply.
///
/// # Errors
/// * `RepositoryError::ValidationError` if the user is blank
/// * `RepositoryError::NotFound` if the installation does not exist
pub async fn update_status<R: FullRepository + ?Sized>(
    repo: &R,
    status: NewStatus,
) -> RepositoryResult<StatusRecord> {
    let user = status.user.trim();
    if user.is_empty() {
        return Err(RepositoryError::validation_with_context(
            "user must not be blank",
            ErrorContext::new("update_status").with_entity_id(&status.installation_id),
        ));
    }
    let status = NewStatus {
        user: user.to_string(),
        ..status
    };

    let record = repo.append_status(&status).await?;
    info!(
        "Installation {} status set to {} by {}",
        record.installation_id, record.status, record.user
    );
    Ok(record)
}

/// # Errors
/// * `RepositoryError::NotFound` if the installation has no status row
pub async fn get_current_status<R: FullRepository + ?Sized>(
    repo: &R,
    installation_id: &str,
) -> RepositoryResult<StatusRecord> {
    repo.fetch_current_status(installation_id)
        .await?
        .ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("No status recorded for installation {}", installation_id),
                ErrorContext::new("get_current_status")
                    .with_entity("installation_status")
                    .with_entity_id(installation_id),
            )
        })
}

/// Every status row, most recent first.
///
/// # Errors
/// * `RepositoryError::NotFound` if the installation does not exist
pub async fn get_status_history<R: FullRepository + ?Sized>(
    repo: &R,
    installation_id: &str,
) -> RepositoryResult<Vec<StatusRecord>> {
    if repo.get_installation(installation_id).await?.is_none() {
        return Err(installation_not_found("get_status_history", installation_id));
    }
    repo.fetch_status_history(installation_id).await
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod services_tests;
