//! Tests for bounds parsing and node subsetting.

use mesh_common::{AxisBounds, BoundingBox, MeshError, NodeCloud, NodeSelection};

// ============================================================================
// AxisBounds tests
// ============================================================================

#[test]
fn test_parse_negative_range() {
    let b = AxisBounds::parse("-125.5,-120").unwrap();
    assert_eq!(b.min, -125.5);
    assert_eq!(b.max, -120.0);
    assert!(b.contains(-125.5));
    assert!(b.contains(-120.0));
    assert!(!b.contains(-119.9));
}

#[test]
fn test_parse_rejects_inverted() {
    let err = AxisBounds::parse("5,1").unwrap_err();
    assert!(matches!(err, MeshError::InvalidBounds(_)));
}

#[test]
fn test_parse_rejects_nan() {
    assert!(AxisBounds::parse("NaN,1").is_err());
}

// ============================================================================
// Selection tests
// ============================================================================

#[test]
fn test_selection_edges_are_inclusive() {
    let cloud = NodeCloud::new(
        vec![0.0, 1.0, 1.000001],
        vec![0.0, 1.0, 0.5],
        vec![1.0, 1.0, 1.0],
    )
    .unwrap();
    let bbox = BoundingBox::from_axes(
        AxisBounds::new(0.0, 1.0).unwrap(),
        AxisBounds::new(0.0, 1.0).unwrap(),
    );

    let sel = NodeSelection::within(&cloud, &bbox);
    assert_eq!(sel.mask(), &[true, true, false]);
    assert!(!sel.is_all());
}

#[test]
fn test_selection_excludes_nan_positions() {
    let cloud = NodeCloud::new(vec![f64::NAN, 0.5], vec![0.5, 0.5], vec![1.0, 1.0]).unwrap();
    let sel = NodeSelection::within(&cloud, &BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!(sel.selected(), 1);
}

#[test]
fn test_selection_length_checked() {
    let sel = NodeSelection::all(3);
    assert!(sel.apply(&[1.0, 2.0]).is_err());
    assert_eq!(sel.apply(&[1, 2, 3]).unwrap(), vec![1, 2, 3]);
}
