//! Drives the junction restrictions plugin through a tool edit, a segment
//! split and a save/load cycle, the way the game loop would.

use bevy::prelude::*;

use junction_restrictions::junction_restrictions::{
    JunctionRestrictionRejected, JunctionRestrictionsManager, JunctionRestrictionsSaveData,
    JunctionRule, RoutingRecalculationRequested, SegmentBecameInvalid, SegmentBecameValid,
    SegmentChangesPublished, SegmentEndReplaced, SetJunctionRestrictionEvent, TernaryFlag,
    ToggleJunctionRestrictionEvent,
};
use junction_restrictions::config::JunctionRestrictionsConfig;
use junction_restrictions::road_topology::{NetworkView, NodeId, RoadTopology, SegmentId, SegmentSplit};
use junction_restrictions::{JunctionRestrictionsPlugin, SaveableRegistry};

struct Crossing {
    topology: RoadTopology,
    center: NodeId,
    south: SegmentId,
}

/// Four two-way arms meeting at a centre node at the origin.
fn crossing() -> Crossing {
    let mut topology = RoadTopology::with_capacity(64, 64);
    let center = topology.add_node(Vec2::ZERO).unwrap();
    let mut south = SegmentId::NONE;
    for pos in [
        Vec2::new(0.0, 100.0),
        Vec2::new(100.0, 0.0),
        Vec2::new(0.0, -100.0),
        Vec2::new(-100.0, 0.0),
    ] {
        let outer = topology.add_node(pos).unwrap();
        let segment = topology.add_segment(outer, center, 1, 1).unwrap();
        if pos.y < 0.0 {
            south = segment;
        }
    }
    Crossing {
        topology,
        center,
        south,
    }
}

fn junction_app(topology: RoadTopology) -> App {
    let mut app = App::new();
    app.add_plugins(JunctionRestrictionsPlugin);
    app.insert_resource(topology);
    app.insert_resource(JunctionRestrictionsManager::with_capacity(64));
    app.update();
    app
}

fn segment_nodes(app: &App, segment_id: SegmentId) -> [NodeId; 2] {
    let topology = app.world().resource::<RoadTopology>();
    [true, false].map(|start_node| {
        topology
            .segment_node(segment_id, start_node)
            .expect("segment should be valid")
    })
}

/// Remove a segment from the network and tell the engine about it.
fn remove_and_notify(app: &mut App, segment_id: SegmentId) {
    let nodes = segment_nodes(app, segment_id);
    app.world_mut()
        .resource_mut::<RoadTopology>()
        .remove_segment(segment_id)
        .expect("segment should exist");
    app.world_mut()
        .send_event(SegmentBecameInvalid { segment_id, nodes });
    app.update();
}

/// Split a segment in half and replay the notifications a split produces.
fn split_and_notify(app: &mut App, segment_id: SegmentId) -> SegmentSplit {
    let nodes = segment_nodes(app, segment_id);
    let split = app
        .world_mut()
        .resource_mut::<RoadTopology>()
        .split_segment(segment_id, Vec2::new(0.0, -50.0))
        .expect("split should succeed");
    app.world_mut()
        .send_event(SegmentBecameInvalid { segment_id, nodes });
    for segment_id in [split.first, split.second] {
        app.world_mut().send_event(SegmentBecameValid { segment_id });
    }
    for (old_end, new_end) in split.replacements() {
        app.world_mut()
            .send_event(SegmentEndReplaced { old_end, new_end });
    }
    app.update();
    split
}

fn count_events<E: Event>(app: &App) -> usize {
    let events = app.world().resource::<Events<E>>();
    let mut reader = events.get_cursor();
    reader.read(events).count()
}

#[test]
fn test_startup_computes_defaults() {
    let c = crossing();
    let south = c.south;
    let app = junction_app(c.topology);

    let manager = app.world().resource::<JunctionRestrictionsManager>();
    assert!(
        manager.is_pedestrian_crossing_allowed(south, false),
        "junctions get a crossing by default"
    );
    assert!(manager.is_uturn_allowed(south, true), "dead ends allow u-turns");
}

#[test]
fn test_set_request_updates_state_and_notifies() {
    let c = crossing();
    let south = c.south;
    let center = c.center;
    let mut app = junction_app(c.topology);

    app.world_mut().send_event(SetJunctionRestrictionEvent {
        segment_id: south,
        start_node: false,
        rule: JunctionRule::PedestrianCrossing,
        allowed: false,
    });
    app.update();

    {
        let world = app.world();
        let manager = world.resource::<JunctionRestrictionsManager>();
        assert!(!manager.is_pedestrian_crossing_allowed(south, false));
        assert!(manager.has_junction_restrictions(world.resource::<RoadTopology>(), center));
    }
    assert_eq!(count_events::<RoutingRecalculationRequested>(&app), 1);
    assert_eq!(count_events::<SegmentChangesPublished>(&app), 1);
    assert_eq!(count_events::<JunctionRestrictionRejected>(&app), 0);

    let save_data = app.world().resource::<JunctionRestrictionsSaveData>();
    assert_eq!(save_data.records.len(), 1, "save data follows the manager");
    assert_eq!(save_data.records[0].segment_id, south.0);
}

#[test]
fn test_requests_on_missing_segments_are_rejected() {
    let c = crossing();
    let mut app = junction_app(c.topology);

    app.world_mut().send_event(ToggleJunctionRestrictionEvent {
        segment_id: SegmentId(40),
        start_node: true,
        rule: JunctionRule::UTurn,
    });
    app.update();

    assert_eq!(count_events::<JunctionRestrictionRejected>(&app), 1);
    assert_eq!(count_events::<RoutingRecalculationRequested>(&app), 0);
}

#[test]
fn test_split_keeps_overrides_on_the_replacement() {
    let c = crossing();
    let south = c.south;
    let mut app = junction_app(c.topology);

    app.world_mut().send_event(SetJunctionRestrictionEvent {
        segment_id: south,
        start_node: false,
        rule: JunctionRule::UTurn,
        allowed: true,
    });
    app.update();

    let split = split_and_notify(&mut app, south);

    let manager = app.world().resource::<JunctionRestrictionsManager>();
    assert_eq!(
        manager.get_uturn_allowed(split.second, false),
        TernaryFlag::True,
        "the half touching the junction inherits the override"
    );
    assert_eq!(
        manager.get_uturn_allowed(split.first, false),
        TernaryFlag::Unset
    );
}

#[test]
fn test_save_and_load_through_registry() {
    let c = crossing();
    let south = c.south;
    let mut app = junction_app(c.topology.clone());

    app.world_mut().send_event(SetJunctionRestrictionEvent {
        segment_id: south,
        start_node: false,
        rule: JunctionRule::LaneChangingWhenGoingStraight,
        allowed: true,
    });
    app.update();

    let extensions = {
        let world = app.world();
        world.resource::<SaveableRegistry>().save_all(world)
    };
    assert!(extensions.contains_key("junction_restrictions"));
    assert!(extensions.contains_key("junction_restrictions_config"));

    let mut loaded = junction_app(c.topology);
    loaded
        .world_mut()
        .resource_scope(|world, registry: Mut<SaveableRegistry>| {
            registry.load_all(world, &extensions);
        });
    assert!(loaded.world().resource::<JunctionRestrictionsSaveData>().needs_apply);
    loaded.update();

    let save_data = loaded.world().resource::<JunctionRestrictionsSaveData>();
    assert!(!save_data.needs_apply);
    assert_eq!(save_data.last_load_ok, Some(true));
    let manager = loaded.world().resource::<JunctionRestrictionsManager>();
    assert!(manager.is_lane_changing_allowed_when_going_straight(south, false));
}

#[test]
fn test_deleted_overrides_do_not_reach_a_reused_id() {
    let c = crossing();
    let south = c.south;
    let mut app = junction_app(c.topology);

    app.world_mut().send_event(SetJunctionRestrictionEvent {
        segment_id: south,
        start_node: false,
        rule: JunctionRule::PedestrianCrossing,
        allowed: false,
    });
    app.update();

    let [outer, center] = segment_nodes(&app, south);
    remove_and_notify(&mut app, south);

    // A new, untouched road takes the freed id.
    let reused = app
        .world_mut()
        .resource_mut::<RoadTopology>()
        .add_segment(outer, center, 1, 1)
        .expect("add should succeed");
    assert_eq!(reused, south, "lowest free id is reused");
    app.world_mut()
        .send_event(SegmentBecameValid { segment_id: reused });
    app.update();

    let split = split_and_notify(&mut app, reused);
    let manager = app.world().resource::<JunctionRestrictionsManager>();
    for segment_id in [split.first, split.second] {
        for start_node in [true, false] {
            assert_eq!(
                manager.get_pedestrian_crossing_allowed(segment_id, start_node),
                TernaryFlag::Unset,
                "the deleted road's override must not come back"
            );
        }
    }
}

#[test]
fn test_removing_an_arm_recomputes_the_remaining_ones() {
    // Three arms meeting at a centre node.
    let mut topology = RoadTopology::with_capacity(16, 16);
    let center = topology.add_node(Vec2::ZERO).unwrap();
    let arms: Vec<SegmentId> = [
        Vec2::new(0.0, 100.0),
        Vec2::new(100.0, 0.0),
        Vec2::new(-100.0, 0.0),
    ]
    .into_iter()
    .map(|pos| {
        let outer = topology.add_node(pos).unwrap();
        topology.add_segment(outer, center, 1, 1).unwrap()
    })
    .collect();
    let mut app = junction_app(topology);

    app.world_mut().send_event(SetJunctionRestrictionEvent {
        segment_id: arms[0],
        start_node: false,
        rule: JunctionRule::LaneChangingWhenGoingStraight,
        allowed: true,
    });
    app.update();
    assert_eq!(
        app.world()
            .resource::<JunctionRestrictionsManager>()
            .get_lane_changing_allowed_when_going_straight(arms[0], false),
        TernaryFlag::True
    );

    remove_and_notify(&mut app, arms[2]);

    let world = app.world();
    assert_eq!(world.resource::<RoadTopology>().node_segments(center).len(), 2);
    let manager = world.resource::<JunctionRestrictionsManager>();
    assert_eq!(
        manager.get_lane_changing_allowed_when_going_straight(arms[0], false),
        TernaryFlag::Unset,
        "a two-segment node no longer offers lane changing"
    );
    assert!(!manager.has_junction_restrictions(world.resource::<RoadTopology>(), center));
}

#[test]
fn test_adding_an_arm_recomputes_its_neighbours() {
    // Two arms: the centre is a plain bend.
    let mut topology = RoadTopology::with_capacity(16, 16);
    let center = topology.add_node(Vec2::ZERO).unwrap();
    let north_node = topology.add_node(Vec2::new(0.0, 100.0)).unwrap();
    let east_node = topology.add_node(Vec2::new(100.0, 0.0)).unwrap();
    let north = topology.add_segment(north_node, center, 1, 1).unwrap();
    topology.add_segment(east_node, center, 1, 1).unwrap();

    let mut app = App::new();
    app.add_plugins(JunctionRestrictionsPlugin);
    app.insert_resource(topology);
    app.insert_resource(JunctionRestrictionsManager::with_capacity(16));
    app.insert_resource(JunctionRestrictionsConfig {
        allow_lane_changes_while_going_straight: true,
        ..Default::default()
    });
    app.update();
    assert!(
        !app.world()
            .resource::<JunctionRestrictionsManager>()
            .is_lane_changing_allowed_when_going_straight(north, false),
        "bends have no lane-change option"
    );

    let west = {
        let mut topology = app.world_mut().resource_mut::<RoadTopology>();
        let west_node = topology.add_node(Vec2::new(-100.0, 0.0)).unwrap();
        topology.add_segment(west_node, center, 1, 1).unwrap()
    };
    app.world_mut()
        .send_event(SegmentBecameValid { segment_id: west });
    app.update();

    assert!(
        app.world()
            .resource::<JunctionRestrictionsManager>()
            .is_lane_changing_allowed_when_going_straight(north, false),
        "the existing arm picks up the junction default"
    );
}
