//! # vidcat-geo
//!
//! Footprint geometry for catalog records.
//!
//! This crate provides:
//!
//! - **[`GeometryCollectionBuilder`]** -- accumulates polygons and raw WKT
//!   fragments and renders a single `GEOMETRYCOLLECTION`.
//! - **[`GeometryOperator`]** -- a step that rewrites a footprint, with the
//!   built-in [`SubpolygonsToEnvelopes`], [`SimplifyOperator`], and the
//!   [`OperatorChain`] combinator.
//! - **[`simplify`]** -- the subpolygon-to-envelope reduction as a plain
//!   function.
//! - **[`wkt_io`]** helpers to read and write WKT text.

pub mod builder;
pub mod envelope;
pub mod operator;
pub mod wkt_io;

pub use builder::GeometryCollectionBuilder;
pub use envelope::{simplify, SubpolygonsToEnvelopes};
pub use operator::{GeometryOperator, OperatorChain, SimplifyOperator};

/// Geometry type used throughout vidcat.
pub type Geometry = geo::Geometry<f64>;
