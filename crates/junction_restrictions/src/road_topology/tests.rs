//! Unit tests for the road topology store and its turn geometry.

use bevy::prelude::*;

use super::*;

/// A four-way crossing around a centre node at the origin. Every arm is a
/// two-way segment running from the outer node into the centre.
struct Crossing {
    topology: RoadTopology,
    center: NodeId,
    north: SegmentId,
    east: SegmentId,
    south: SegmentId,
    west: SegmentId,
}

fn crossing() -> Crossing {
    let mut topology = RoadTopology::with_capacity(32, 32);
    let center = topology.add_node(Vec2::ZERO).unwrap();
    let mut arm = |pos: Vec2| {
        let outer = topology.add_node(pos).unwrap();
        topology.add_segment(outer, center, 1, 1).unwrap()
    };
    let north = arm(Vec2::new(0.0, 100.0));
    let east = arm(Vec2::new(100.0, 0.0));
    let south = arm(Vec2::new(0.0, -100.0));
    let west = arm(Vec2::new(-100.0, 0.0));
    Crossing {
        topology,
        center,
        north,
        east,
        south,
        west,
    }
}

#[test]
fn test_slot_zero_is_never_allocated() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::X).unwrap();
    assert_eq!(a, NodeId(1));
    let seg = topology.add_segment(a, b, 1, 1).unwrap();
    assert_eq!(seg, SegmentId(1));
    assert!(!topology.is_segment_valid(SegmentId::NONE));
    assert!(!topology.is_node_valid(NodeId::NONE));
}

#[test]
fn test_freed_segment_ids_are_reused_lowest_first() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::X).unwrap();
    let c = topology.add_node(Vec2::Y).unwrap();
    let first = topology.add_segment(a, b, 1, 1).unwrap();
    let second = topology.add_segment(b, c, 1, 1).unwrap();
    topology.remove_segment(first);
    assert!(!topology.is_segment_valid(first));
    assert_eq!(topology.node_segments(b), &[second]);

    let reused = topology.add_segment(a, c, 1, 1).unwrap();
    assert_eq!(reused, first);
}

#[test]
fn test_capacity_is_fixed() {
    let mut topology = RoadTopology::with_capacity(2, 8);
    let a = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::X).unwrap();
    assert!(topology.add_segment(a, b, 1, 1).is_some());
    assert!(
        topology.add_segment(b, a, 1, 1).is_none(),
        "capacity 2 leaves exactly one usable segment slot"
    );
}

#[test]
fn test_node_with_segments_cannot_be_removed() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::X).unwrap();
    let seg = topology.add_segment(a, b, 1, 1).unwrap();
    assert!(topology.remove_node(a).is_none());
    topology.remove_segment(seg);
    assert!(topology.remove_node(a).is_some());
}

#[test]
fn test_shape_flags_follow_segment_count() {
    let c = crossing();
    let flags = c.topology.effective_node_flags(c.center).unwrap();
    assert!(flags.contains(NodeFlags::JUNCTION));
    assert!(!flags.intersects(NodeFlags::BEND | NodeFlags::END));

    let outer = c.topology.segment_node(c.north, true).unwrap();
    assert_eq!(
        c.topology.effective_node_flags(outer).unwrap(),
        NodeFlags::END
    );
}

#[test]
fn test_explicit_junction_suppresses_bend() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::new(-1.0, 0.0)).unwrap();
    let mid = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::new(1.0, 0.0)).unwrap();
    topology.add_segment(a, mid, 1, 1).unwrap();
    topology.add_segment(mid, b, 1, 1).unwrap();
    assert_eq!(topology.effective_node_flags(mid), Some(NodeFlags::BEND));

    topology.set_node_flags(mid, NodeFlags::JUNCTION | NodeFlags::TRAFFIC_LIGHTS);
    let flags = topology.effective_node_flags(mid).unwrap();
    assert!(flags.contains(NodeFlags::JUNCTION | NodeFlags::TRAFFIC_LIGHTS));
    assert!(!flags.intersects(NodeFlags::BEND));
}

#[test]
fn test_snapshot_counts_lanes_per_direction() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::new(-1.0, 0.0)).unwrap();
    let mid = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::new(1.0, 0.0)).unwrap();
    // a -> mid: two lanes into mid, one lane back out.
    topology.add_segment(a, mid, 2, 1).unwrap();
    // mid -> b: one-way, leaving mid.
    topology.add_segment(mid, b, 1, 0).unwrap();

    let snapshot = topology.node_snapshot(mid).unwrap();
    assert_eq!(snapshot.segment_count, 2);
    assert_eq!(snapshot.incoming_vehicle_lanes, 2);
    assert_eq!(snapshot.outgoing_vehicle_lanes, 2);
}

#[test]
fn test_segment_end_geometry_for_one_way() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::X).unwrap();
    let seg = topology.add_segment(a, b, 1, 0).unwrap();

    let start = topology.segment_end_geometry(seg, true).unwrap();
    assert!(start.one_way && start.outgoing && !start.incoming);
    assert!(start.is_outgoing_one_way());

    let end = topology.segment_end_geometry(seg, false).unwrap();
    assert!(end.one_way && !end.outgoing && end.incoming);
    assert!(!end.is_outgoing_one_way());
}

#[test]
fn test_turn_classification_at_crossing() {
    let c = crossing();
    // Arriving from the south, heading north.
    let from = SegmentEndId::new(c.south, false);
    assert_eq!(
        c.topology.classify_turn(from, c.east),
        Some(ArrowDirection::Right)
    );
    assert_eq!(
        c.topology.classify_turn(from, c.west),
        Some(ArrowDirection::Left)
    );
    assert_eq!(
        c.topology.classify_turn(from, c.north),
        Some(ArrowDirection::Forward)
    );

    let directions = c.topology.outgoing_directions(c.south, false);
    assert_eq!(directions.len(), 3);
    assert!(directions.contains(&(c.east, ArrowDirection::Right)));
}

#[test]
fn test_turn_on_red_neighbors_at_crossing() {
    let c = crossing();
    let neighbors = c.topology.turn_on_red_neighbors(c.south, false);
    assert_eq!(neighbors.left, Some(c.west));
    assert_eq!(neighbors.right, Some(c.east));
    assert_eq!(c.center, c.topology.segment_node(c.south, false).unwrap());
}

#[test]
fn test_turn_on_red_ignores_segments_without_outgoing_lanes() {
    let mut c = crossing();
    // East arm becomes one-way towards the centre: nobody can turn into it.
    c.topology.set_segment_lanes(c.east, 1, 0);
    let neighbors = c.topology.turn_on_red_neighbors(c.south, false);
    assert_eq!(neighbors.left, Some(c.west));
    assert_eq!(
        neighbors.right, None,
        "sharpest right is now the straight-ahead arm"
    );
}

#[test]
fn test_turn_on_red_requires_incoming_end() {
    let mut c = crossing();
    // South arm one-way away from the centre: vehicles never wait there.
    c.topology.set_segment_lanes(c.south, 0, 1);
    let neighbors = c.topology.turn_on_red_neighbors(c.south, false);
    assert_eq!(neighbors, TurnOnRedNeighbors::default());
}

#[test]
fn test_split_segment_reports_replacements() {
    let mut topology = RoadTopology::with_capacity(8, 8);
    let a = topology.add_node(Vec2::ZERO).unwrap();
    let b = topology.add_node(Vec2::new(100.0, 0.0)).unwrap();
    let seg = topology.add_segment(a, b, 2, 1).unwrap();

    let split = topology
        .split_segment(seg, Vec2::new(50.0, 0.0))
        .expect("split should succeed");
    assert_eq!(split.first, seg, "first half reuses the freed id");
    assert_ne!(split.second, seg);
    assert_eq!(topology.segment_node(split.first, true), Some(a));
    assert_eq!(topology.segment_node(split.second, false), Some(b));
    assert_eq!(topology.segment(split.second).unwrap().forward_lanes, 2);

    let [start, end] = split.replacements();
    assert_eq!(start.0, SegmentEndId::new(seg, true));
    assert_eq!(start.1, SegmentEndId::new(split.first, true));
    assert_eq!(end.1, SegmentEndId::new(split.second, false));
}

#[test]
fn test_service_class_reaches_snapshot() {
    let mut c = crossing();
    assert!(c.topology.set_node_service(c.center, ServiceClass::Beautification));
    let snapshot = c.topology.node_snapshot(c.center).unwrap();
    assert_eq!(snapshot.service, ServiceClass::Beautification);
    assert!(!c.topology.set_node_service(NodeId(31), ServiceClass::Road), "unknown node");
}
