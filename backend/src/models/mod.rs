pub mod area;
pub mod geojson;
pub mod geometry;
pub mod installation;
pub mod macros;
pub mod query;

pub use area::*;
pub use geojson::*;
pub use geometry::*;
pub use installation::*;
pub use query::*;
