//! Spatial predicate shared by every map query.
//!
//! A [`SpatialFilter`] is chosen once per request and then either rendered to a
//! PostGIS `WHERE` fragment (Postgres repository) or compiled into an in-process
//! [`SpatialMatcher`] (local repository). Both paths must agree:
//!
//! | Filter         | PostGIS                                   | In process                 |
//! |----------------|-------------------------------------------|----------------------------|
//! | `Unbounded`    | `TRUE`                                    | always true                |
//! | `Envelope`     | `geom && ST_MakeEnvelope(..., 4326)`      | inclusive box test         |
//! | `Municipality` | `municipality = $n`                       | exact string equality      |
//! | `Within`       | `ST_Contains(polygon, geom)`              | `geo::Contains`            |

use geo::MultiPolygon;

use crate::models::{area_contains, AreaPolygon, AreaSelection, BoundingBox, Installation, SRID};

/// Value bound to a positional `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBind {
    Float(f64),
    Text(String),
}

/// A rendered `WHERE` fragment and the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub clause: String,
    pub binds: Vec<SqlBind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialFilter {
    Unbounded,
    Envelope(BoundingBox),
    Municipality(String),
    Within(AreaPolygon),
}

impl SpatialFilter {
    /// Viewport filter for the main query map.
    pub fn from_bounds(bounds: Option<BoundingBox>) -> Self {
        match bounds {
            Some(bounds) => SpatialFilter::Envelope(bounds),
            None => SpatialFilter::Unbounded,
        }
    }

    /// Render against the installations table aliased as `alias`, numbering
    /// placeholders from `first_param`.
    pub fn to_sql(&self, alias: &str, first_param: usize) -> SqlPredicate {
        let n = first_param;
        match self {
            SpatialFilter::Unbounded => SqlPredicate {
                clause: "TRUE".to_string(),
                binds: Vec::new(),
            },
            SpatialFilter::Envelope(b) => SqlPredicate {
                clause: format!(
                    "{alias}.geom && ST_MakeEnvelope(${}, ${}, ${}, ${}, {SRID})",
                    n,
                    n + 1,
                    n + 2,
                    n + 3
                ),
                binds: vec![
                    SqlBind::Float(b.min_lng),
                    SqlBind::Float(b.min_lat),
                    SqlBind::Float(b.max_lng),
                    SqlBind::Float(b.max_lat),
                ],
            },
            SpatialFilter::Municipality(name) => SqlPredicate {
                clause: format!("{alias}.municipality = ${n}"),
                binds: vec![SqlBind::Text(name.clone())],
            },
            SpatialFilter::Within(polygon) => SqlPredicate {
                clause: format!(
                    "ST_Contains(ST_SetSRID(ST_GeomFromGeoJSON(${n}), {SRID}), {alias}.geom)"
                ),
                binds: vec![SqlBind::Text(polygon.to_geojson())],
            },
        }
    }

    /// Prepare the filter for repeated in-memory evaluation.
    pub fn matcher(&self) -> SpatialMatcher<'_> {
        match self {
            SpatialFilter::Unbounded => SpatialMatcher::All,
            SpatialFilter::Envelope(bounds) => SpatialMatcher::Envelope(*bounds),
            SpatialFilter::Municipality(name) => SpatialMatcher::Municipality(name),
            SpatialFilter::Within(polygon) => SpatialMatcher::Within(polygon.to_multi_polygon()),
        }
    }
}

impl From<&AreaSelection> for SpatialFilter {
    fn from(selection: &AreaSelection) -> Self {
        match selection {
            AreaSelection::Municipality(name) => SpatialFilter::Municipality(name.clone()),
            AreaSelection::Polygon(polygon) => SpatialFilter::Within(polygon.clone()),
        }
    }
}

/// In-process form of a [`SpatialFilter`].
pub enum SpatialMatcher<'a> {
    All,
    Envelope(BoundingBox),
    Municipality(&'a str),
    Within(MultiPolygon<f64>),
}

impl SpatialMatcher<'_> {
    pub fn matches(&self, installation: &Installation) -> bool {
        match self {
            SpatialMatcher::All => true,
            SpatialMatcher::Envelope(bounds) => {
                bounds.contains(installation.longitude, installation.latitude)
            }
            SpatialMatcher::Municipality(name) => installation.municipality == *name,
            SpatialMatcher::Within(area) => {
                area_contains(area, installation.longitude, installation.latitude)
            }
        }
    }
}
