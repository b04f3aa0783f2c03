//! WKT text helpers.

use geo::HasDimensions;
use wkt::{ToWkt, TryFromWkt};

use vidcat_core::{Error, Result};

use crate::Geometry;

/// Parse WKT text into a geometry.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the text is not valid WKT.
pub fn parse(text: &str) -> Result<Geometry> {
    Geometry::try_from_wkt_str(text.trim())
        .map_err(|e| Error::invalid_argument(format!("invalid WKT {text:?}: {e}")))
}

/// Render a geometry as WKT text.
pub fn render(geometry: &Geometry) -> String {
    geometry.wkt_string()
}

/// Flatten a geometry into its non-empty leaf members.
///
/// Collections are opened recursively; every other kind is a leaf.
pub fn leaves(geometry: Geometry) -> Vec<Geometry> {
    let mut out = Vec::new();
    push_leaves(geometry, &mut out);
    out
}

fn push_leaves(geometry: Geometry, out: &mut Vec<Geometry>) {
    match geometry {
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                push_leaves(member, out);
            }
        }
        other if other.is_empty() => {}
        other => out.push(other),
    }
}
