use bevy::prelude::*;

use crate::config::JunctionRestrictionsConfig;
use crate::lane_connections::UturnLaneConnections;
use crate::road_topology::RoadTopology;
use crate::JunctionSet;

use super::events::{
    JunctionRestrictionRejected, RoutingRecalculationRequested, SegmentBecameInvalid,
    SegmentBecameValid, SegmentChangesPublished, SegmentEndReplaced, SetJunctionRestrictionEvent,
    ToggleJunctionRestrictionEvent,
};
use super::manager::JunctionRestrictionsManager;
use super::persistence::JunctionRestrictionsSaveData;
use super::systems::{
    apply_loaded_junction_restrictions, handle_set_requests, handle_toggle_requests,
    handle_topology_changes, publish_junction_notifications, rebuild_junction_restrictions,
    save_data_needs_apply, sync_junction_save_data,
};

pub struct JunctionRestrictionsPlugin;

impl Plugin for JunctionRestrictionsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RoadTopology>()
            .init_resource::<UturnLaneConnections>()
            .init_resource::<JunctionRestrictionsConfig>()
            .init_resource::<JunctionRestrictionsManager>()
            .init_resource::<JunctionRestrictionsSaveData>()
            .add_event::<SegmentBecameValid>()
            .add_event::<SegmentBecameInvalid>()
            .add_event::<SegmentEndReplaced>()
            .add_event::<SetJunctionRestrictionEvent>()
            .add_event::<ToggleJunctionRestrictionEvent>()
            .add_event::<RoutingRecalculationRequested>()
            .add_event::<SegmentChangesPublished>()
            .add_event::<JunctionRestrictionRejected>()
            .configure_sets(
                Update,
                (
                    JunctionSet::Topology,
                    JunctionSet::Requests,
                    JunctionSet::Notify,
                )
                    .chain(),
            )
            .add_systems(Startup, rebuild_junction_restrictions)
            .add_systems(
                Update,
                (
                    handle_topology_changes,
                    apply_loaded_junction_restrictions.run_if(save_data_needs_apply),
                )
                    .chain()
                    .in_set(JunctionSet::Topology),
            )
            .add_systems(
                Update,
                (handle_set_requests, handle_toggle_requests)
                    .chain()
                    .in_set(JunctionSet::Requests),
            )
            .add_systems(
                Update,
                (publish_junction_notifications, sync_junction_save_data)
                    .chain()
                    .in_set(JunctionSet::Notify),
            )
            .add_systems(PostStartup, crate::saveable_keys::validate_saveable_registry);

        // Register for save/load via the SaveableRegistry.
        app.init_resource::<crate::SaveableRegistry>();
        let mut registry = app.world_mut().resource_mut::<crate::SaveableRegistry>();
        registry.register::<JunctionRestrictionsSaveData>();
        registry.register::<JunctionRestrictionsConfig>();
    }
}
