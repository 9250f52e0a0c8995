//! Public API surface for the map backend.
//!
//! Response payloads shared by the service layer and the HTTP handlers. The
//! property and metadata names are consumed verbatim by the map front end.

use serde::{Deserialize, Serialize};

use crate::models::{
    AreaKind, AuxiliaryQueryId, Feature, FeatureCollection, MainQueryId, ReturnType, TargetType,
};

/// Properties of one main-query feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainResultProperties {
    pub installation_id: String,
    pub municipality: String,
    pub tariff_class: Option<String>,
    pub target_type: TargetType,
    pub score: Option<f64>,
    pub query_id: MainQueryId,
    pub query_name: String,
    pub query_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainResultsMetadata {
    pub query_id: MainQueryId,
    pub query_name: String,
    pub query_color: String,
    pub total_results: usize,
}

/// Properties of one auxiliary-query feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryResultProperties {
    pub installation_id: String,
    pub municipality: String,
    pub tariff_class: Option<String>,
    pub return_type: ReturnType,
    #[serde(rename = "intensidade")]
    pub intensity: Option<f64>,
    pub query_id: AuxiliaryQueryId,
    pub query_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryResultsMetadata {
    pub query_id: AuxiliaryQueryId,
    pub query_name: String,
    pub return_type: ReturnType,
    pub area_type: AreaKind,
    pub total_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityProperties {
    pub id: i32,
    pub name: String,
}

pub type MainResults = FeatureCollection<MainResultProperties, MainResultsMetadata>;
pub type AuxiliaryResults = FeatureCollection<AuxiliaryResultProperties, AuxiliaryResultsMetadata>;
pub type MunicipalityFeature = Feature<MunicipalityProperties>;
