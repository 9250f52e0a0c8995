//! HTTP handlers for the REST API.
//!
//! Each handler parses its inputs, delegates to [`crate::db::services`] and
//! serializes the result. Error mapping lives in [`super::error`].

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};

use super::dto::{
    AreaQuery, BoundsQuery, HealthResponse, LimitQuery, MetricsRequest, RootResponse,
    StatusUpdateRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::api::{AuxiliaryResults, MainResults, MunicipalityFeature};
use crate::db::services as db_services;
use crate::models::{
    AreaMetrics, AuxiliaryQuery, AuxiliaryQueryId, BoundingBox, ConsumptionRecord, FraudRecord,
    Installation, MainQuery, MainQueryId, Municipality, ServiceNote, StatusRecord,
};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Service
// =============================================================================

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "SASI API - Sistema de Apoio à Seleção de Inspeções".to_string(),
        version: VERSION.to_string(),
    })
}

/// GET /health
///
/// Reports the service as up even when the database is not; `database`
/// carries the connection state.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let (status, database) = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => ("ok", "connected"),
        Ok(false) => ("degraded", "disconnected"),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            ("degraded", "error")
        }
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: VERSION.to_string(),
        database: database.to_string(),
    }))
}

// =============================================================================
// Queries
// =============================================================================

/// GET /api/queries/main
pub async fn list_main_queries(State(state): State<AppState>) -> HandlerResult<Vec<MainQuery>> {
    let queries = db_services::list_main_queries(state.repository.as_ref()).await?;
    Ok(Json(queries))
}

/// GET /api/queries/main/{id}/results?bounds=minLng,minLat,maxLng,maxLat
pub async fn main_query_results(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    Query(query): Query<BoundsQuery>,
) -> HandlerResult<MainResults> {
    let Path(query_id) = path?;
    let bounds = BoundingBox::parse_optional(query.bounds.as_deref());
    let results = db_services::get_main_query_results(
        state.repository.as_ref(),
        MainQueryId::new(query_id),
        bounds,
    )
    .await?;
    Ok(Json(results))
}

/// GET /api/queries/auxiliary
pub async fn list_auxiliary_queries(
    State(state): State<AppState>,
) -> HandlerResult<Vec<AuxiliaryQuery>> {
    let queries = db_services::list_auxiliary_queries(state.repository.as_ref()).await?;
    Ok(Json(queries))
}

/// GET /api/queries/auxiliary/{id}/results?area_type=municipio|poligono&area_value=...
pub async fn auxiliary_query_results(
    State(state): State<AppState>,
    path: Result<Path<i32>, PathRejection>,
    query: Result<Query<AreaQuery>, QueryRejection>,
) -> HandlerResult<AuxiliaryResults> {
    let Path(query_id) = path?;
    let Query(query) = query?;
    let area = query.to_selection()?;
    let results = db_services::get_auxiliary_query_results(
        state.repository.as_ref(),
        AuxiliaryQueryId::new(query_id),
        &area,
    )
    .await?;
    Ok(Json(results))
}

// =============================================================================
// Installations
// =============================================================================

/// GET /api/installations/{id}
pub async fn get_installation(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
) -> HandlerResult<Installation> {
    let installation =
        db_services::get_installation(state.repository.as_ref(), &installation_id).await?;
    Ok(Json(installation))
}

/// GET /api/installations/{id}/consumption?limit=N
pub async fn consumption_history(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> HandlerResult<Vec<ConsumptionRecord>> {
    let Query(query) = query?;
    let rows = db_services::get_consumption_history(
        state.repository.as_ref(),
        &installation_id,
        query.limit,
    )
    .await?;
    Ok(Json(rows))
}

/// GET /api/installations/{id}/frauds
pub async fn fraud_history(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
) -> HandlerResult<Vec<FraudRecord>> {
    let rows = db_services::get_fraud_history(state.repository.as_ref(), &installation_id).await?;
    Ok(Json(rows))
}

/// GET /api/installations/{id}/service-notes?limit=N
pub async fn service_notes(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> HandlerResult<Vec<ServiceNote>> {
    let Query(query) = query?;
    let rows =
        db_services::get_service_notes(state.repository.as_ref(), &installation_id, query.limit)
            .await?;
    Ok(Json(rows))
}

/// GET /api/installations/{id}/status
pub async fn current_status(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
) -> HandlerResult<StatusRecord> {
    let record =
        db_services::get_current_status(state.repository.as_ref(), &installation_id).await?;
    Ok(Json(record))
}

/// PUT /api/installations/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> HandlerResult<StatusRecord> {
    let Json(request) = body?;
    let record = db_services::update_status(
        state.repository.as_ref(),
        request.into_new_status(installation_id),
    )
    .await?;
    Ok(Json(record))
}

/// GET /api/installations/{id}/status/history
pub async fn status_history(
    State(state): State<AppState>,
    Path(installation_id): Path<String>,
) -> HandlerResult<Vec<StatusRecord>> {
    let rows =
        db_services::get_status_history(state.repository.as_ref(), &installation_id).await?;
    Ok(Json(rows))
}

// =============================================================================
// Areas
// =============================================================================

/// GET /api/areas/municipalities
pub async fn list_municipalities(
    State(state): State<AppState>,
) -> HandlerResult<Vec<Municipality>> {
    let municipalities = db_services::list_municipalities(state.repository.as_ref()).await?;
    Ok(Json(municipalities))
}

/// GET /api/areas/municipalities/{name}/geometry
pub async fn municipality_geometry(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> HandlerResult<MunicipalityFeature> {
    let feature = db_services::get_municipality_feature(state.repository.as_ref(), &name).await?;
    Ok(Json(feature))
}

/// POST /api/areas/metrics
pub async fn area_metrics(
    State(state): State<AppState>,
    body: Result<Json<MetricsRequest>, JsonRejection>,
) -> HandlerResult<AreaMetrics> {
    let Json(request) = body?;
    let area = request.into_selection()?;
    let metrics = db_services::compute_area_metrics(state.repository.as_ref(), &area).await?;
    Ok(Json(metrics))
}
