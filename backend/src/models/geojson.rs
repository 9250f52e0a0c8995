//! GeoJSON `Feature` and `FeatureCollection` envelopes.

use serde::{Deserialize, Serialize};

use super::geometry::Geometry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature<P> {
    #[serde(rename = "type")]
    pub kind: FeatureTag,
    pub geometry: Geometry,
    pub properties: P,
}

impl<P> Feature<P> {
    pub fn new(geometry: Geometry, properties: P) -> Self {
        Self {
            kind: FeatureTag::Feature,
            geometry,
            properties,
        }
    }
}

/// A collection of features with service-specific metadata alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<P, M> {
    #[serde(rename = "type")]
    pub kind: CollectionTag,
    pub features: Vec<Feature<P>>,
    pub metadata: M,
}

impl<P, M> FeatureCollection<P, M> {
    pub fn new(features: Vec<Feature<P>>, metadata: M) -> Self {
        Self {
            kind: CollectionTag::FeatureCollection,
            features,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureTag {
    Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionTag {
    FeatureCollection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_collection_shape() {
        let collection = FeatureCollection::new(
            vec![Feature::new(
                Geometry::point(-35.2, -5.8),
                json!({"installation_id": "INST001"}),
            )],
            json!({"total_results": 1}),
        );
        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
        assert_eq!(value["features"][0]["properties"]["installation_id"], "INST001");
        assert_eq!(value["metadata"]["total_results"], 1);
    }
}
