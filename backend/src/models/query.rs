//! Precomputed main and auxiliary queries and their per-installation results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::define_id_type;

define_id_type!(i32, MainQueryId);
define_id_type!(i32, AuxiliaryQueryId);

fn default_active() -> bool {
    true
}

/// A statewide target list flagged for fraud inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainQuery {
    pub id: MainQueryId,
    pub name: String,
    pub description: Option<String>,
    /// Display colour as `#RRGGBB`.
    pub color: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl MainQuery {
    /// `#RRGGBB` with hex digits of either case.
    pub fn has_valid_color(&self) -> bool {
        let color = self.color.as_bytes();
        color.len() == 7 && color[0] == b'#' && color[1..].iter().all(u8::is_ascii_hexdigit)
    }
}

/// Contextual dataset that only applies inside a selected area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryQuery {
    pub id: AuxiliaryQueryId,
    pub name: String,
    pub description: Option<String>,
    pub return_type: ReturnType,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Strength of a main-query hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Regular,
    #[serde(alias = "forte")]
    Strong,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Regular => "regular",
            TargetType::Strong => "strong",
        }
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(TargetType::Regular),
            "strong" | "forte" => Ok(TargetType::Strong),
            other => Err(format!("Unknown target type: {}", other)),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an auxiliary query's values should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    #[serde(alias = "instalacao")]
    Installation,
    Heatmap,
}

impl ReturnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnType::Installation => "installation",
            ReturnType::Heatmap => "heatmap",
        }
    }
}

impl FromStr for ReturnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installation" | "instalacao" => Ok(ReturnType::Installation),
            "heatmap" => Ok(ReturnType::Heatmap),
            other => Err(format!("Unknown return type: {}", other)),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installation joined to its main-query result row.
#[derive(Debug, Clone, PartialEq)]
pub struct MainQueryHit {
    pub installation_id: String,
    pub municipality: String,
    pub tariff_class: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    pub target_type: TargetType,
    pub score: Option<f64>,
}

/// An installation joined to its auxiliary-query result row.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxiliaryQueryHit {
    pub installation_id: String,
    pub municipality: String,
    pub tariff_class: Option<String>,
    pub longitude: f64,
    pub latitude: f64,
    /// Normalized heat-map value in `[0, 1]`.
    pub intensity: Option<f64>,
}

/// A precomputed main-query result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainQueryResult {
    pub query_id: MainQueryId,
    pub installation_id: String,
    pub target_type: TargetType,
    #[serde(default)]
    pub score: Option<f64>,
}

/// A precomputed auxiliary-query result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryQueryResult {
    pub query_id: AuxiliaryQueryId,
    pub installation_id: String,
    #[serde(default)]
    pub intensity: Option<f64>,
}

impl AuxiliaryQueryResult {
    /// Missing intensities are allowed; present ones must lie in `[0, 1]`.
    pub fn has_valid_intensity(&self) -> bool {
        self.intensity.map_or(true, |v| (0.0..=1.0).contains(&v))
    }
}
