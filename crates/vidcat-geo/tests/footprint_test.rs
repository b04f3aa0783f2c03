//! End-to-end footprint processing through the public API: frame polygons
//! in, one simplified `GEOMETRYCOLLECTION` out.

use geo::BoundingRect;
use vidcat_geo::{
    simplify, wkt_io, Geometry, GeometryCollectionBuilder, GeometryOperator, OperatorChain,
};

fn frames() -> GeometryCollectionBuilder {
    let mut builder = GeometryCollectionBuilder::new();
    // Two overlapping frames over the harbor mouth, one frame far away.
    builder
        .add_polygon(&[0.0, 0.0, 4.0, 0.0, 4.0, 3.0, 0.0, 3.0, 0.0, 0.0])
        .unwrap()
        .add_polygon(&[3.0, 1.0, 7.0, 1.0, 7.0, 5.0, 3.0, 5.0, 3.0, 1.0])
        .unwrap()
        .add_polygon(&[50.0, 50.0, 51.0, 50.0, 51.0, 52.0, 50.0, 50.0])
        .unwrap();
    builder.add_wkt("POINT (20 20)");
    builder
}

#[test]
fn frames_reduce_to_cluster_envelopes() {
    let collection = wkt_io::parse(&frames().render()).unwrap();

    let simplified = simplify(Some(collection)).unwrap();
    let members = wkt_io::leaves(simplified);

    assert_eq!(members.len(), 3);
    assert!(members.contains(&wkt_io::parse("POINT (20 20)").unwrap()));

    let mut extents: Vec<_> = members
        .iter()
        .filter_map(|g| match g {
            Geometry::Polygon(p) => p.bounding_rect(),
            _ => None,
        })
        .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
        .collect();
    extents.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(extents, vec![(0.0, 0.0, 7.0, 5.0), (50.0, 50.0, 51.0, 52.0)]);
}

#[test]
fn chain_output_renders_back_to_collection() {
    let collection = wkt_io::parse(&frames().render()).unwrap();
    let footprint = OperatorChain::footprint(Some(0.1))
        .apply(Some(collection))
        .unwrap();

    let mut out = GeometryCollectionBuilder::new();
    out.add_geometry(footprint);
    let rendered = out.render();

    assert!(rendered.starts_with("GEOMETRYCOLLECTION ("));
    assert_eq!(out.len(), 3);
    assert_eq!(wkt_io::leaves(wkt_io::parse(&rendered).unwrap()).len(), 3);
}
