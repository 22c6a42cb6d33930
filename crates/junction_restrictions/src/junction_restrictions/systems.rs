use bevy::prelude::*;

use crate::config::JunctionRestrictionsConfig;
use crate::lane_connections::UturnLaneConnections;
use crate::road_topology::RoadTopology;

use super::events::{
    JunctionRestrictionRejected, RoutingRecalculationRequested, SegmentBecameInvalid,
    SegmentBecameValid, SegmentChangesPublished, SegmentEndReplaced, SetJunctionRestrictionEvent,
    ToggleJunctionRestrictionEvent,
};
use super::manager::{JunctionNotification, JunctionRestrictionsManager};
use super::persistence::JunctionRestrictionsSaveData;
use super::predicates::RuleContext;

/// Read-only collaborators of the manager, bundled for systems.
#[derive(bevy::ecs::system::SystemParam)]
pub struct JunctionCollaborators<'w> {
    pub topology: Res<'w, RoadTopology>,
    pub lane_connections: Res<'w, UturnLaneConnections>,
    pub config: Res<'w, JunctionRestrictionsConfig>,
}

impl JunctionCollaborators<'_> {
    pub fn ctx(&self) -> RuleContext<'_> {
        RuleContext::new(&*self.topology, &*self.lane_connections, &self.config)
    }
}

/// Compute defaults for the network present at startup.
pub fn rebuild_junction_restrictions(
    collaborators: JunctionCollaborators,
    mut manager: ResMut<JunctionRestrictionsManager>,
) {
    manager.rebuild_all(&collaborators.ctx());
}

/// Apply topology notifications: removals first so quarantined flags exist
/// before replacements claim them. Segments left behind at the nodes of a
/// removed segment are recomputed against their new shape.
pub fn handle_topology_changes(
    mut invalid: EventReader<SegmentBecameInvalid>,
    mut valid: EventReader<SegmentBecameValid>,
    mut replaced: EventReader<SegmentEndReplaced>,
    collaborators: JunctionCollaborators,
    mut manager: ResMut<JunctionRestrictionsManager>,
) {
    let ctx = collaborators.ctx();
    let mut touched_nodes = Vec::new();
    for event in invalid.read() {
        manager.handle_invalid_segment(event.segment_id);
        touched_nodes.extend(event.nodes);
    }
    for event in valid.read() {
        manager.handle_valid_segment(&ctx, event.segment_id);
    }
    touched_nodes.sort_unstable();
    touched_nodes.dedup();
    for node_id in touched_nodes {
        manager.update_node_defaults(&ctx, node_id);
    }
    for event in replaced.read() {
        manager.handle_segment_end_replacement(&ctx, event.old_end, event.new_end);
    }
}

pub fn save_data_needs_apply(save_data: Res<JunctionRestrictionsSaveData>) -> bool {
    save_data.needs_apply
}

/// One-shot after a load: rebuild from scratch, then re-apply the loaded
/// records against the current network.
pub fn apply_loaded_junction_restrictions(
    collaborators: JunctionCollaborators,
    mut manager: ResMut<JunctionRestrictionsManager>,
    mut save_data: ResMut<JunctionRestrictionsSaveData>,
) {
    let ctx = collaborators.ctx();
    manager.reset();
    manager.rebuild_all(&ctx);
    let ok = manager.load_data(&ctx, &save_data.records);
    if !ok {
        warn!("Junction restrictions: some saved records could not be loaded");
    }
    save_data.needs_apply = false;
    save_data.last_load_ok = Some(ok);
}

pub fn handle_set_requests(
    mut requests: EventReader<SetJunctionRestrictionEvent>,
    mut rejected: EventWriter<JunctionRestrictionRejected>,
    collaborators: JunctionCollaborators,
    mut manager: ResMut<JunctionRestrictionsManager>,
) {
    let ctx = collaborators.ctx();
    for request in requests.read() {
        if !manager.set_allowed(
            &ctx,
            request.rule,
            request.segment_id,
            request.start_node,
            request.allowed,
        ) {
            rejected.send(JunctionRestrictionRejected {
                segment_id: request.segment_id,
                start_node: request.start_node,
                rule: request.rule,
            });
        }
    }
}

pub fn handle_toggle_requests(
    mut requests: EventReader<ToggleJunctionRestrictionEvent>,
    mut rejected: EventWriter<JunctionRestrictionRejected>,
    collaborators: JunctionCollaborators,
    mut manager: ResMut<JunctionRestrictionsManager>,
) {
    let ctx = collaborators.ctx();
    for request in requests.read() {
        if !manager.toggle_allowed(&ctx, request.rule, request.segment_id, request.start_node) {
            rejected.send(JunctionRestrictionRejected {
                segment_id: request.segment_id,
                start_node: request.start_node,
                rule: request.rule,
            });
        }
    }
}

/// Forward the manager's outbox to routing and change listeners, in order.
pub fn publish_junction_notifications(
    mut manager: ResMut<JunctionRestrictionsManager>,
    mut recalculations: EventWriter<RoutingRecalculationRequested>,
    mut published: EventWriter<SegmentChangesPublished>,
) {
    for notification in manager.drain_notifications() {
        match notification {
            JunctionNotification::RecalculateRouting(segment_id) => {
                recalculations.send(RoutingRecalculationRequested { segment_id });
            }
            JunctionNotification::PublishSegmentChanges(segment_id) => {
                published.send(SegmentChangesPublished { segment_id });
            }
        }
    }
}

/// Refresh the save payload whenever the manager changed.
pub fn sync_junction_save_data(
    manager: Res<JunctionRestrictionsManager>,
    topology: Res<RoadTopology>,
    mut save_data: ResMut<JunctionRestrictionsSaveData>,
    mut last_gen: Local<Option<u32>>,
) {
    // Loaded records waiting to be applied must not be overwritten.
    if save_data.needs_apply || *last_gen == Some(manager.generation()) {
        return;
    }
    *last_gen = Some(manager.generation());

    let (records, ok) = manager.save_data(&*topology);
    if !ok {
        warn!("Junction restrictions: save data is incomplete, see errors above");
    }
    save_data.records = records;
}
