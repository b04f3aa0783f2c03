//! Parent record updaters.
//!
//! After every segment the parent (whole-stream) record is folded together
//! with the new child record. Updaters are infallible: bad input on either
//! side is logged and skipped.

use geo::GeometryCollection;
use std::sync::Arc;

use vidcat_core::{attributes, AttributeValue, Record};
use vidcat_geo::{wkt_io, Geometry, GeometryCollectionBuilder, GeometryOperator, OperatorChain};

/// Folds a child record into its parent.
pub trait RecordUpdater: Send + Sync {
    fn name(&self) -> &'static str;

    fn update(&self, parent: &mut Record, child: &Record);
}

/// Appends the child's id to the parent's derived associations.
///
/// Existing entries are kept in order. The same child is appended again if
/// it is passed twice; callers only ever pass each segment once.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedAssociationUpdater;

impl RecordUpdater for DerivedAssociationUpdater {
    fn name(&self) -> &'static str {
        "derived-association"
    }

    fn update(&self, parent: &mut Record, child: &Record) {
        let mut derived: Vec<AttributeValue> = parent
            .attribute(attributes::DERIVED)
            .map(<[AttributeValue]>::to_vec)
            .unwrap_or_default();
        derived.push(AttributeValue::Text(child.id().to_string()));
        parent.set_attribute(attributes::DERIVED, derived);
    }
}

/// Keeps the parent's `temporal.start` at the earliest child start.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalStartUpdater;

impl RecordUpdater for TemporalStartUpdater {
    fn name(&self) -> &'static str {
        "temporal-start"
    }

    fn update(&self, parent: &mut Record, child: &Record) {
        let Some(child_start) = child.timestamp(attributes::TEMPORAL_START) else {
            return;
        };
        match parent.timestamp(attributes::TEMPORAL_START) {
            Some(current) if current <= child_start => {}
            _ => parent.set(attributes::TEMPORAL_START, child_start),
        }
    }
}

/// Keeps the parent's `temporal.end` at the latest child end.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalEndUpdater;

impl RecordUpdater for TemporalEndUpdater {
    fn name(&self) -> &'static str {
        "temporal-end"
    }

    fn update(&self, parent: &mut Record, child: &Record) {
        let Some(child_end) = child.timestamp(attributes::TEMPORAL_END) else {
            return;
        };
        match parent.timestamp(attributes::TEMPORAL_END) {
            Some(current) if current >= child_end => {}
            _ => parent.set(attributes::TEMPORAL_END, child_end),
        }
    }
}

/// Merges the child's footprint into the parent's.
///
/// Both locations are parsed, flattened into one collection, and run through
/// the operator (subpolygon envelopes by default) before being written back.
pub struct LocationUpdater {
    operator: Arc<dyn GeometryOperator>,
}

impl LocationUpdater {
    pub fn new(operator: Arc<dyn GeometryOperator>) -> Self {
        Self { operator }
    }
}

impl Default for LocationUpdater {
    fn default() -> Self {
        Self::new(Arc::new(OperatorChain::footprint(None)))
    }
}

impl std::fmt::Debug for LocationUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationUpdater")
            .field("operator", &self.operator.name())
            .finish()
    }
}

impl RecordUpdater for LocationUpdater {
    fn name(&self) -> &'static str {
        "location"
    }

    fn update(&self, parent: &mut Record, child: &Record) {
        let Some(child_wkt) = child.text(attributes::LOCATION) else {
            return;
        };

        let mut members = Vec::new();
        let sides = [
            ("parent", parent.text(attributes::LOCATION)),
            ("child", Some(child_wkt)),
        ];
        for (side, text) in sides {
            let Some(text) = text else { continue };
            match wkt_io::parse(text) {
                Ok(geometry) => members.extend(wkt_io::leaves(geometry)),
                Err(e) => tracing::warn!(side, error = %e, "Ignoring unparseable location"),
            }
        }
        if members.is_empty() {
            return;
        }

        let combined = Geometry::GeometryCollection(GeometryCollection::new_from(members));
        let Some(footprint) = self.operator.apply(Some(combined)) else {
            return;
        };

        let mut builder = GeometryCollectionBuilder::new();
        builder.add_geometry(footprint);
        let rendered = builder.render();
        if !rendered.is_empty() {
            parent.set(attributes::LOCATION, rendered);
        }
    }
}

/// Applies updaters in order.
#[derive(Default)]
pub struct UpdaterList {
    updaters: Vec<Box<dyn RecordUpdater>>,
}

impl UpdaterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append an updater.
    pub fn with(mut self, updater: impl RecordUpdater + 'static) -> Self {
        self.updaters.push(Box::new(updater));
        self
    }

    /// Derived association first, then the temporal and location updaters.
    pub fn parent_defaults(operator: Arc<dyn GeometryOperator>) -> Self {
        Self::new()
            .with(DerivedAssociationUpdater)
            .with(TemporalStartUpdater)
            .with(TemporalEndUpdater)
            .with(LocationUpdater::new(operator))
    }

    pub fn len(&self) -> usize {
        self.updaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updaters.is_empty()
    }
}

impl std::fmt::Debug for UpdaterList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.updaters.iter().map(|u| u.name()).collect();
        f.debug_struct("UpdaterList").field("updaters", &names).finish()
    }
}

impl RecordUpdater for UpdaterList {
    fn name(&self) -> &'static str {
        "list"
    }

    fn update(&self, parent: &mut Record, child: &Record) {
        for updater in &self.updaters {
            updater.update(parent, child);
        }
    }
}
