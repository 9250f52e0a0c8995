//! GeoJSON geometry types and validation of user-supplied spatial inputs.
//!
//! Positions follow the GeoJSON convention `[longitude, latitude]` and every
//! stored geometry uses the WGS84 reference system ([`SRID`]). Validation here
//! is structural only; the heavy spatial work (containment, perimeter) is done
//! by PostGIS in production and by the `geo` crate for the local repository.

use std::str::FromStr;

use geo::{Contains, Coord, GeodesicLength, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Spatial reference id for every stored point and polygon (WGS84).
pub const SRID: i32 = 4326;

/// A GeoJSON position: `[longitude, latitude]`.
pub type Position = [f64; 2];

/// Errors raised while validating geometry coming from a client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid GeoJSON: {0}")]
    InvalidJson(String),

    #[error("expected a Polygon or MultiPolygon geometry, got {0}")]
    UnsupportedType(String),

    #[error("polygon has no rings")]
    EmptyPolygon,

    #[error("ring {ring} has {len} positions, at least 4 are required")]
    RingTooShort { ring: usize, len: usize },

    #[error("ring {ring} is not closed")]
    RingNotClosed { ring: usize },

    #[error("coordinates must be finite numbers")]
    NonFiniteCoordinate,

    #[error("position [{lng}, {lat}] is outside longitude [-180, 180] or latitude [-90, 90]")]
    CoordinateOutOfRange { lng: f64, lat: f64 },

    #[error("invalid bounds '{0}': expected minLng,minLat,maxLng,maxLat")]
    InvalidBounds(String),
}

/// GeoJSON geometry object, restricted to the shapes this service handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl Geometry {
    /// Point geometry for an installation.
    pub fn point(longitude: f64, latitude: f64) -> Self {
        Geometry::Point {
            coordinates: [longitude, latitude],
        }
    }

    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }

    /// Convert an areal geometry into a `geo` multipolygon. Points yield `None`.
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Geometry::Point { .. } => None,
            Geometry::Polygon { coordinates } => {
                Some(MultiPolygon::new(vec![polygon_from_rings(coordinates)]))
            }
            Geometry::MultiPolygon { coordinates } => Some(MultiPolygon::new(
                coordinates.iter().map(|p| polygon_from_rings(p)).collect(),
            )),
        }
    }
}

fn ring_to_line_string(ring: &[Position]) -> LineString<f64> {
    ring.iter()
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect::<Vec<_>>()
        .into()
}

fn polygon_from_rings(rings: &[Vec<Position>]) -> Polygon<f64> {
    let mut rings = rings.iter().map(|r| ring_to_line_string(r));
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

/// Point-in-area test with `ST_Contains` semantics: points on the boundary
/// are not contained.
pub fn area_contains(area: &MultiPolygon<f64>, longitude: f64, latitude: f64) -> bool {
    let point = Point::new(longitude, latitude);
    area.iter().any(|polygon| polygon.contains(&point))
}

/// Perimeter in kilometres measured on the WGS84 ellipsoid, including
/// interior rings, matching `ST_Perimeter(geom::geography)`.
pub fn geodesic_perimeter_km(area: &MultiPolygon<f64>) -> f64 {
    let metres: f64 = area
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .map(|ring| ring.geodesic_length())
        .sum();
    metres / 1000.0
}

// =============================================================================
// Bounding box
// =============================================================================

/// Axis-aligned viewport envelope in SRID 4326.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Build an envelope from two corners; the corners may come in any order.
    pub fn new(lng_a: f64, lat_a: f64, lng_b: f64, lat_b: f64) -> Self {
        Self {
            min_lng: lng_a.min(lng_b),
            min_lat: lat_a.min(lat_b),
            max_lng: lng_a.max(lng_b),
            max_lat: lat_a.max(lat_b),
        }
    }

    /// Envelope intersection for a point (boundary inclusive, like `&&`).
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.min_lng..=self.max_lng).contains(&longitude)
            && (self.min_lat..=self.max_lat).contains(&latitude)
    }

    /// Lenient parse used by the viewport filter: anything malformed is
    /// treated as "no bounds".
    pub fn parse_optional(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse() {
            Ok(bounds) => Some(bounds),
            Err(e) => {
                log::warn!("Ignoring bounds filter: {}", e);
                None
            }
        }
    }
}

impl FromStr for BoundingBox {
    type Err = GeometryError;

    /// Parse `minLng,minLat,maxLng,maxLat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| GeometryError::InvalidBounds(s.to_string()))?;

        match values.as_slice() {
            [a, b, c, d] if values.iter().all(|v| v.is_finite()) => {
                Ok(BoundingBox::new(*a, *b, *c, *d))
            }
            _ => Err(GeometryError::InvalidBounds(s.to_string())),
        }
    }
}

// =============================================================================
// Area polygon
// =============================================================================

/// A validated Polygon or MultiPolygon drawn by the analyst.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaPolygon {
    geometry: Geometry,
}

impl AreaPolygon {
    /// Validate a geometry for use as an area filter.
    pub fn from_geometry(geometry: Geometry) -> Result<Self, GeometryError> {
        match &geometry {
            Geometry::Polygon { coordinates } => validate_rings(coordinates)?,
            Geometry::MultiPolygon { coordinates } => {
                if coordinates.is_empty() {
                    return Err(GeometryError::EmptyPolygon);
                }
                for polygon in coordinates {
                    validate_rings(polygon)?;
                }
            }
            other => return Err(GeometryError::UnsupportedType(other.type_name().to_string())),
        }
        Ok(Self { geometry })
    }

    /// Accept either a bare geometry object or a Feature wrapping one.
    pub fn from_value(value: serde_json::Value) -> Result<Self, GeometryError> {
        let value = match value {
            serde_json::Value::Object(mut map)
                if map.get("type").and_then(|t| t.as_str()) == Some("Feature") =>
            {
                map.remove("geometry").unwrap_or(serde_json::Value::Null)
            }
            other => other,
        };

        let type_name = value
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string);
        let geometry: Geometry = serde_json::from_value(value).map_err(|e| match type_name {
            Some(t) if !matches!(t.as_str(), "Polygon" | "MultiPolygon" | "Point") => {
                GeometryError::UnsupportedType(t)
            }
            _ => GeometryError::InvalidJson(e.to_string()),
        })?;
        Self::from_geometry(geometry)
    }

    /// Parse a GeoJSON string (the `area_value` query parameter).
    pub fn parse(text: &str) -> Result<Self, GeometryError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| GeometryError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Canonical GeoJSON text handed to `ST_GeomFromGeoJSON`.
    pub fn to_geojson(&self) -> String {
        serde_json::to_string(&self.geometry).unwrap_or_default()
    }

    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        self.geometry
            .to_multi_polygon()
            .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
    }
}

fn position_in_range([lng, lat]: &Position) -> bool {
    (-180.0..=180.0).contains(lng) && (-90.0..=90.0).contains(lat)
}

fn validate_rings(rings: &[Vec<Position>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::EmptyPolygon);
    }
    for (index, ring) in rings.iter().enumerate() {
        if ring.iter().flatten().any(|v| !v.is_finite()) {
            return Err(GeometryError::NonFiniteCoordinate);
        }
        if let Some([lng, lat]) = ring.iter().find(|p| !position_in_range(p)) {
            return Err(GeometryError::CoordinateOutOfRange {
                lng: *lng,
                lat: *lat,
            });
        }
        if ring.len() < 4 {
            return Err(GeometryError::RingTooShort {
                ring: index,
                len: ring.len(),
            });
        }
        if ring.first() != ring.last() {
            return Err(GeometryError::RingNotClosed { ring: index });
        }
    }
    Ok(())
}
