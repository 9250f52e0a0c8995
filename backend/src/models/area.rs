//! Area selection (municipality or drawn polygon) and aggregated area metrics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::geometry::{AreaPolygon, Geometry, GeometryError};

/// Label for installations without a tariff class in the distribution.
pub const UNCLASSIFIED_TARIFF: &str = "Não Classificado";

/// Length of the trailing fraud window, in days (five 365-day years).
pub const FRAUD_WINDOW_DAYS: i64 = 5 * 365;

/// First date inside the trailing fraud window ending at `now`.
pub fn fraud_window_start(now: DateTime<Utc>) -> NaiveDate {
    (now - Duration::days(FRAUD_WINDOW_DAYS)).date_naive()
}

/// A named municipality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Municipality {
    pub id: i32,
    pub name: String,
}

/// A municipality with its boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityGeometry {
    pub id: i32,
    pub name: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AreaSelectionError {
    #[error("invalid area type '{0}': expected 'municipio' or 'poligono'")]
    UnknownAreaType(String),

    #[error("municipality name must not be empty")]
    EmptyMunicipality,

    #[error("municipality area value must be a string")]
    MunicipalityNotString,

    #[error("invalid polygon: {0}")]
    Polygon(#[from] GeometryError),
}

/// Area discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AreaKind {
    #[serde(rename = "municipio", alias = "municipality")]
    Municipality,
    #[serde(rename = "poligono", alias = "polygon")]
    Polygon,
}

impl AreaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaKind::Municipality => "municipio",
            AreaKind::Polygon => "poligono",
        }
    }
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaKind {
    type Err = AreaSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "municipio" | "municipality" => Ok(AreaKind::Municipality),
            "poligono" | "polygon" => Ok(AreaKind::Polygon),
            other => Err(AreaSelectionError::UnknownAreaType(other.to_string())),
        }
    }
}

/// The spatial scope an analyst selected.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaSelection {
    Municipality(String),
    Polygon(AreaPolygon),
}

impl AreaSelection {
    /// Build a selection from the `area_type`/`area_value` query parameters.
    pub fn from_query(area_type: &str, area_value: &str) -> Result<Self, AreaSelectionError> {
        match area_type.parse::<AreaKind>()? {
            AreaKind::Municipality => Self::municipality(area_value),
            AreaKind::Polygon => Ok(AreaSelection::Polygon(AreaPolygon::parse(area_value)?)),
        }
    }

    /// Build a selection from a JSON body value. Polygons may arrive either as
    /// an object or as a JSON-encoded string.
    pub fn from_value(kind: AreaKind, value: serde_json::Value) -> Result<Self, AreaSelectionError> {
        match (kind, value) {
            (AreaKind::Municipality, serde_json::Value::String(name)) => Self::municipality(&name),
            (AreaKind::Municipality, _) => Err(AreaSelectionError::MunicipalityNotString),
            (AreaKind::Polygon, serde_json::Value::String(text)) => {
                Ok(AreaSelection::Polygon(AreaPolygon::parse(&text)?))
            }
            (AreaKind::Polygon, value) => {
                Ok(AreaSelection::Polygon(AreaPolygon::from_value(value)?))
            }
        }
    }

    fn municipality(name: &str) -> Result<Self, AreaSelectionError> {
        if name.trim().is_empty() {
            return Err(AreaSelectionError::EmptyMunicipality);
        }
        Ok(AreaSelection::Municipality(name.to_string()))
    }

    pub fn kind(&self) -> AreaKind {
        match self {
            AreaSelection::Municipality(_) => AreaKind::Municipality,
            AreaSelection::Polygon(_) => AreaKind::Polygon,
        }
    }
}

/// Installation count for one tariff class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffBucket {
    #[serde(rename = "classe_tarifaria")]
    pub tariff_class: String,
    pub count: i64,
}

/// Aggregates shown when an analyst selects an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMetrics {
    #[serde(rename = "perimetro_km")]
    pub perimeter_km: Option<f64>,
    #[serde(rename = "total_instalacoes")]
    pub total_installations: i64,
    #[serde(rename = "total_fraudes_5anos")]
    pub fraud_installations_5y: i64,
    #[serde(rename = "distribuicao_tarifa")]
    pub tariff_distribution: Vec<TariffBucket>,
}

/// Order a tariff distribution by descending count, then class name.
pub fn sort_tariff_distribution(buckets: &mut [TariffBucket]) {
    buckets.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.tariff_class.cmp(&b.tariff_class))
    });
}
