//! Where segment footprints come from.
//!
//! Demultiplexing the metadata track is outside this crate; a decoder plugs
//! in here and reports one footprint geometry per frame it found.

use vidcat_geo::Geometry;

use crate::buffer::SegmentData;

/// Extracts frame footprints from a finished segment.
pub trait FootprintSource: Send + Sync {
    fn footprints(&self, segment: &SegmentData) -> Vec<Geometry>;
}

impl<F> FootprintSource for F
where
    F: Fn(&SegmentData) -> Vec<Geometry> + Send + Sync,
{
    fn footprints(&self, segment: &SegmentData) -> Vec<Geometry> {
        self(segment)
    }
}

/// Reports the same footprints for every segment. Useful for fixed cameras.
#[derive(Debug, Clone, Default)]
pub struct StaticFootprint {
    geometries: Vec<Geometry>,
}

impl StaticFootprint {
    pub fn new(geometries: Vec<Geometry>) -> Self {
        Self { geometries }
    }
}

impl FootprintSource for StaticFootprint {
    fn footprints(&self, _segment: &SegmentData) -> Vec<Geometry> {
        self.geometries.clone()
    }
}
