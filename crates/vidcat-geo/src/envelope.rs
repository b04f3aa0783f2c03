//! Subpolygon-to-envelope reduction.
//!
//! Video footprints accumulate one small polygon per frame. Replacing every
//! disjoint cluster with its bounding rectangle keeps the stored vertex count
//! proportional to the number of regions instead of the number of frames.

use geo::{Area, BooleanOps, BoundingRect, GeometryCollection, MultiPolygon, Polygon, Rect};

use crate::operator::GeometryOperator;
use crate::Geometry;

/// Reduce a footprint to per-component envelopes.
///
/// - `None` stays `None`.
/// - Empty geometries of any kind come back unchanged.
/// - A single polygon is returned as-is.
/// - A multipolygon keeps its component count and order; each component is
///   replaced by its own envelope. Components are never merged.
/// - A geometry collection keeps its non-polygonal members and gains one
///   envelope per disjoint component of the union of its polygonal members.
///   A zero-area polygonal member keeps its own envelope unless another
///   envelope already covers it.
///   A collection without polygonal members is returned as-is.
/// - Every other kind passes through.
pub fn simplify(geometry: Option<Geometry>) -> Option<Geometry> {
    geometry.map(simplify_geometry)
}

fn simplify_geometry(geometry: Geometry) -> Geometry {
    match geometry {
        Geometry::MultiPolygon(multi) if !multi.0.is_empty() => {
            Geometry::MultiPolygon(MultiPolygon::new(
                multi.0.into_iter().map(envelope).collect(),
            ))
        }
        Geometry::GeometryCollection(collection)
            if collection.0.iter().any(is_polygonal) =>
        {
            Geometry::GeometryCollection(envelope_collection(collection))
        }
        other => other,
    }
}

fn is_polygonal(geometry: &Geometry) -> bool {
    matches!(
        geometry,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)
    )
}

/// Envelope of one polygon. Polygons without coordinates have no envelope
/// and are returned unchanged.
fn envelope(polygon: Polygon<f64>) -> Polygon<f64> {
    match polygon.bounding_rect() {
        Some(rect) => rect.to_polygon(),
        None => polygon,
    }
}

fn envelope_collection(collection: GeometryCollection<f64>) -> GeometryCollection<f64> {
    let mut members = Vec::with_capacity(collection.0.len());
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for member in collection.0 {
        match member {
            Geometry::Polygon(polygon) => polygons.push(polygon),
            Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
            Geometry::Rect(rect) => polygons.push(rect.to_polygon()),
            Geometry::Triangle(triangle) => polygons.push(triangle.to_polygon()),
            other => members.push(other),
        }
    }

    // Union runs on the polygonal subset only; mixed collections cannot be
    // unioned directly. Zero-area members vanish from a union, so they are
    // kept aside and contribute their own envelope.
    let (areal, degenerate): (Vec<_>, Vec<_>) = polygons
        .into_iter()
        .filter(|polygon| !polygon.exterior().0.is_empty())
        .partition(|polygon| polygon.unsigned_area() > 0.0);

    let merged = areal
        .iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, polygon| {
            acc.union(polygon)
        });

    tracing::trace!(
        polygons = areal.len(),
        degenerate = degenerate.len(),
        components = merged.0.len(),
        "Merged footprint polygons"
    );

    let mut envelopes: Vec<Rect<f64>> = merged
        .0
        .iter()
        .filter_map(|component| component.bounding_rect())
        .collect();
    for rect in degenerate.iter().filter_map(|polygon| polygon.bounding_rect()) {
        if !envelopes.iter().any(|outer| covers(outer, &rect)) {
            envelopes.push(rect);
        }
    }

    members.extend(
        envelopes
            .into_iter()
            .map(|rect| Geometry::Polygon(rect.to_polygon())),
    );
    GeometryCollection::new_from(members)
}

fn covers(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// [`GeometryOperator`] wrapper around [`simplify`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SubpolygonsToEnvelopes;

impl GeometryOperator for SubpolygonsToEnvelopes {
    fn name(&self) -> &'static str {
        "subpolygons-to-envelopes"
    }

    fn apply(&self, geometry: Option<Geometry>) -> Option<Geometry> {
        simplify(geometry)
    }
}
