//! Data Transfer Objects for the HTTP API.
//!
//! Request bodies, query strings and the small service responses. The
//! GeoJSON payloads live in [`crate::api`] and are re-exported here.

use serde::{Deserialize, Serialize};

pub use crate::api::{
    AuxiliaryResultProperties, AuxiliaryResults, AuxiliaryResultsMetadata, MainResultProperties,
    MainResults, MainResultsMetadata, MunicipalityFeature, MunicipalityProperties,
};
use crate::models::{AreaSelection, AreaSelectionError, NewStatus, StatusValue};

/// `?bounds=minLng,minLat,maxLng,maxLat`. Kept as text: malformed bounds are
/// ignored rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundsQuery {
    #[serde(default)]
    pub bounds: Option<String>,
}

/// `?area_type=municipio|poligono&area_value=...`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaQuery {
    #[serde(default)]
    pub area_type: Option<String>,
    #[serde(default)]
    pub area_value: Option<String>,
}

impl AreaQuery {
    pub fn to_selection(&self) -> Result<AreaSelection, AreaSelectionError> {
        let area_type = self.area_type.as_deref().unwrap_or_default();
        let area_value = self.area_value.as_deref().unwrap_or_default();
        AreaSelection::from_query(area_type, area_value)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Body of `PUT /api/installations/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: StatusValue,
    #[serde(alias = "usuario")]
    pub user: String,
    #[serde(default, alias = "observacoes")]
    pub notes: Option<String>,
}

impl StatusUpdateRequest {
    pub fn into_new_status(self, installation_id: String) -> NewStatus {
        NewStatus {
            installation_id,
            status: self.status,
            user: self.user,
            notes: self.notes,
        }
    }
}

/// Body of `POST /api/areas/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRequest {
    #[serde(alias = "type")]
    pub tipo: String,
    #[serde(alias = "value")]
    pub valor: serde_json::Value,
}

impl MetricsRequest {
    pub fn into_selection(self) -> Result<AreaSelection, AreaSelectionError> {
        AreaSelection::from_value(self.tipo.parse()?, self.valor)
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Service banner for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}
