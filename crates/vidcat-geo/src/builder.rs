//! Incremental `GEOMETRYCOLLECTION` assembly.
//!
//! Elements are validated as they are added and kept typed; the WKT text is
//! produced only by [`GeometryCollectionBuilder::render`]. An untouched
//! builder renders to the empty string, which callers treat as "no
//! footprint" and omit the attribute.

use std::fmt;

use vidcat_core::{Error, Result};

use crate::{wkt_io, Geometry};

#[derive(Debug, Clone, PartialEq)]
enum Element {
    /// Flat `x, y, x, y, ...` ring, already validated.
    Polygon(Vec<f64>),
    /// Non-blank WKT fragment, emitted verbatim.
    Wkt(String),
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Polygon(coordinates) => {
                f.write_str("POLYGON ((")?;
                for (i, pair) in coordinates.chunks_exact(2).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?} {:?}", pair[0], pair[1])?;
                }
                f.write_str("))")
            }
            Element::Wkt(text) => f.write_str(text),
        }
    }
}

/// Accumulates footprint elements into one WKT geometry collection.
#[derive(Debug, Clone, Default)]
pub struct GeometryCollectionBuilder {
    elements: Vec<Element>,
}

impl GeometryCollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a polygon given as alternating X, Y values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the count is odd, if fewer than
    /// three coordinate pairs are given, or if any value is not finite.
    pub fn add_polygon(&mut self, coordinates: &[f64]) -> Result<&mut Self> {
        if coordinates.len() % 2 != 0 {
            return Err(Error::invalid_argument("Must have even number of points"));
        }
        if coordinates.len() < 6 {
            return Err(Error::invalid_argument(
                "Must have at least 3 pairs of points",
            ));
        }
        if let Some(bad) = coordinates.iter().find(|v| !v.is_finite()) {
            return Err(Error::invalid_argument(format!(
                "Polygon coordinate {bad} is not a finite number"
            )));
        }

        self.elements.push(Element::Polygon(coordinates.to_vec()));
        Ok(self)
    }

    /// Append a raw WKT fragment. `None` and blank fragments are ignored.
    pub fn add_wkt<'a>(&mut self, fragment: impl Into<Option<&'a str>>) -> &mut Self {
        if let Some(text) = fragment.into() {
            if !text.trim().is_empty() {
                self.elements.push(Element::Wkt(text.to_string()));
            }
        }
        self
    }

    /// Append every non-empty leaf of `geometry` as its own element.
    pub fn add_geometry(&mut self, geometry: Geometry) -> &mut Self {
        for leaf in wkt_io::leaves(geometry) {
            self.elements.push(Element::Wkt(wkt_io::render(&leaf)));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Render the collection, or `""` when nothing was added.
    pub fn render(&self) -> String {
        if self.elements.is_empty() {
            return String::new();
        }

        let members: Vec<String> = self.elements.iter().map(Element::to_string).collect();
        format!("GEOMETRYCOLLECTION ({})", members.join(", "))
    }
}

impl fmt::Display for GeometryCollectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
