//! The [`GeometryOperator`] trait defines a single footprint rewrite step.
//!
//! Operators are total: they accept `None`, empty, and unsupported geometries
//! and hand back something sensible instead of failing, so a chain of them
//! can run on whatever the metadata track produced.

use geo::{GeometryCollection, SimplifyVw};

use crate::envelope::SubpolygonsToEnvelopes;
use crate::Geometry;

/// A single step in footprint post-processing.
pub trait GeometryOperator: Send + Sync {
    /// A short, human-readable name used in logs.
    fn name(&self) -> &'static str;

    /// Rewrite the geometry.
    fn apply(&self, geometry: Option<Geometry>) -> Option<Geometry>;
}

/// Vertex reduction with the Visvalingam-Whyatt algorithm.
///
/// Lines and polygons are simplified with the configured area tolerance;
/// collections are simplified member by member; every other kind passes
/// through.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyOperator {
    tolerance: f64,
}

impl SimplifyOperator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn simplify(&self, geometry: Geometry) -> Geometry {
        match geometry {
            Geometry::LineString(line) => Geometry::LineString(line.simplify_vw(self.tolerance)),
            Geometry::MultiLineString(lines) => {
                Geometry::MultiLineString(lines.simplify_vw(self.tolerance))
            }
            Geometry::Polygon(polygon) => Geometry::Polygon(polygon.simplify_vw(self.tolerance)),
            Geometry::MultiPolygon(polygons) => {
                Geometry::MultiPolygon(polygons.simplify_vw(self.tolerance))
            }
            Geometry::GeometryCollection(collection) => {
                Geometry::GeometryCollection(GeometryCollection::new_from(
                    collection.0.into_iter().map(|g| self.simplify(g)).collect(),
                ))
            }
            other => other,
        }
    }
}

impl GeometryOperator for SimplifyOperator {
    fn name(&self) -> &'static str {
        "simplify"
    }

    fn apply(&self, geometry: Option<Geometry>) -> Option<Geometry> {
        geometry.map(|g| self.simplify(g))
    }
}

/// Runs operators in order, feeding each one's output to the next.
#[derive(Default)]
pub struct OperatorChain {
    operators: Vec<Box<dyn GeometryOperator>>,
}

impl OperatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append an operator.
    pub fn then(mut self, operator: impl GeometryOperator + 'static) -> Self {
        self.operators.push(Box::new(operator));
        self
    }

    /// The chain used for stream footprints: envelopes first, then optional
    /// vertex reduction.
    pub fn footprint(simplify_tolerance: Option<f64>) -> Self {
        let chain = Self::new().then(SubpolygonsToEnvelopes);
        match simplify_tolerance {
            Some(tolerance) => chain.then(SimplifyOperator::new(tolerance)),
            None => chain,
        }
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl std::fmt::Debug for OperatorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.operators.iter().map(|op| op.name()).collect();
        f.debug_struct("OperatorChain").field("operators", &names).finish()
    }
}

impl GeometryOperator for OperatorChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn apply(&self, geometry: Option<Geometry>) -> Option<Geometry> {
        self.operators
            .iter()
            .fold(geometry, |current, operator| operator.apply(current))
    }
}
