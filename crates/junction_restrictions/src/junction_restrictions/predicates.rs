//! Configurability and default predicates for the six junction rules.
//!
//! Every predicate reads a caller-supplied [`NodeSnapshot`] and never touches
//! the flag tables, so bulk recomputation can evaluate them against a copy of
//! the node state.

use bevy::prelude::*;

use crate::config::JunctionRestrictionsConfig;
use crate::lane_connections::LaneConnectionQuery;
use crate::road_topology::{NetworkView, NodeFlags, NodeSnapshot, SegmentId};

use super::flags::{JunctionRule, SegmentEndFlags, TernaryFlag};

/// Collaborators every geometry-dependent call needs.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub network: &'a dyn NetworkView,
    pub lane_connections: &'a dyn LaneConnectionQuery,
    pub config: &'a JunctionRestrictionsConfig,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        network: &'a dyn NetworkView,
        lane_connections: &'a dyn LaneConnectionQuery,
        config: &'a JunctionRestrictionsConfig,
    ) -> Self {
        Self {
            network,
            lane_connections,
            config,
        }
    }

    fn is_one_way(&self, segment_id: SegmentId, start_node: bool) -> bool {
        self.network
            .segment_end_geometry(segment_id, start_node)
            .is_some_and(|geometry| geometry.one_way)
    }

    fn is_outgoing_one_way(&self, segment_id: SegmentId, start_node: bool) -> bool {
        self.network
            .segment_end_geometry(segment_id, start_node)
            .is_some_and(|geometry| geometry.is_outgoing_one_way())
    }
}

// =============================================================================
// U-turns
// =============================================================================

pub fn is_uturn_configurable(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    if !ctx.network.is_segment_valid(segment_id) {
        return false;
    }

    node.flags.intersects(
        NodeFlags::JUNCTION
            | NodeFlags::TRANSITION
            | NodeFlags::END
            | NodeFlags::BEND
            | NodeFlags::ONE_WAY_OUT,
    ) && !node.service.is_beautification()
        && !ctx.is_one_way(segment_id, start_node)
}

pub fn default_uturn_allowed(
    ctx: &RuleContext,
    _segment_id: SegmentId,
    _start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    // Dead ends and one-way exits always allow turning around, configurable
    // or not.
    if node.flags.intersects(NodeFlags::END | NodeFlags::ONE_WAY_OUT) {
        return true;
    }

    ctx.config.allow_u_turns && node.flags.intersects(NodeFlags::JUNCTION | NodeFlags::TRANSITION)
}

// =============================================================================
// Turn on red
// =============================================================================

/// Near means the drive side: right in right-hand traffic, left otherwise.
pub fn is_turn_on_red_configurable(
    ctx: &RuleContext,
    near: bool,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    if !node.flags.contains(NodeFlags::TRAFFIC_LIGHTS) {
        return false;
    }

    let neighbors = ctx.network.turn_on_red_neighbors(segment_id, start_node);
    let lhd = ctx.config.left_hand_drive;
    (lhd == near && neighbors.left.is_some()) || (lhd != near && neighbors.right.is_some())
}

pub fn default_turn_on_red_allowed(
    ctx: &RuleContext,
    near: bool,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    is_turn_on_red_configurable(ctx, near, segment_id, start_node, node)
        && ctx.config.allow_turn_on_red(near)
}

// =============================================================================
// Lane changing when going straight
// =============================================================================

pub fn is_lane_changing_configurable(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    if !ctx.network.is_segment_valid(segment_id) {
        return false;
    }

    node.flags
        .intersects(NodeFlags::JUNCTION | NodeFlags::TRANSITION)
        && !node.service.is_beautification()
        && !ctx.is_outgoing_one_way(segment_id, start_node)
        && node.segment_count > 2
}

pub fn default_lane_changing_allowed(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    is_lane_changing_configurable(ctx, segment_id, start_node, node)
        && ctx.config.allow_lane_changes_while_going_straight
}

// =============================================================================
// Entering a blocked junction
// =============================================================================

pub fn is_entering_blocked_configurable(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    if !ctx.network.is_segment_valid(segment_id) {
        return false;
    }

    node.flags.contains(NodeFlags::JUNCTION)
        && !node.service.is_beautification()
        && !ctx.is_outgoing_one_way(segment_id, start_node)
}

pub fn default_entering_blocked_allowed(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    if !ctx.network.is_segment_valid(segment_id) {
        return false;
    }

    if !is_entering_blocked_configurable(ctx, segment_id, start_node, node) {
        let plain_junction = node.flags.masked(
            NodeFlags::JUNCTION | NodeFlags::ONE_WAY_IN | NodeFlags::ONE_WAY_OUT,
        ) == NodeFlags::JUNCTION;
        return !plain_junction || node.segment_count == 2;
    }

    if ctx.config.allow_enter_blocked_junctions {
        return true;
    }

    // A single lane in either direction leaves no room for ambiguity.
    node.outgoing_vehicle_lanes == 1 || node.incoming_vehicle_lanes == 1
}

// =============================================================================
// Pedestrian crossings
// =============================================================================

pub fn is_pedestrian_crossing_configurable(
    _ctx: &RuleContext,
    _segment_id: SegmentId,
    _start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    node.flags.intersects(NodeFlags::JUNCTION | NodeFlags::BEND)
        && !node.service.is_beautification()
}

pub fn default_pedestrian_crossing_allowed(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    if !is_pedestrian_crossing_configurable(ctx, segment_id, start_node, node) {
        return true;
    }

    // Untouchable nodes cover things like spiral ramps in parking garages.
    node.flags
        .intersects(NodeFlags::JUNCTION | NodeFlags::UNTOUCHABLE)
}

// =============================================================================
// Rule dispatch
// =============================================================================

pub fn is_configurable(
    ctx: &RuleContext,
    rule: JunctionRule,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    match rule {
        JunctionRule::UTurn => is_uturn_configurable(ctx, segment_id, start_node, node),
        JunctionRule::NearTurnOnRed => {
            is_turn_on_red_configurable(ctx, true, segment_id, start_node, node)
        }
        JunctionRule::FarTurnOnRed => {
            is_turn_on_red_configurable(ctx, false, segment_id, start_node, node)
        }
        JunctionRule::LaneChangingWhenGoingStraight => {
            is_lane_changing_configurable(ctx, segment_id, start_node, node)
        }
        JunctionRule::EnteringBlockedJunction => {
            is_entering_blocked_configurable(ctx, segment_id, start_node, node)
        }
        JunctionRule::PedestrianCrossing => {
            is_pedestrian_crossing_configurable(ctx, segment_id, start_node, node)
        }
    }
}

pub fn default_allowed(
    ctx: &RuleContext,
    rule: JunctionRule,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
) -> bool {
    match rule {
        JunctionRule::UTurn => default_uturn_allowed(ctx, segment_id, start_node, node),
        JunctionRule::NearTurnOnRed => {
            default_turn_on_red_allowed(ctx, true, segment_id, start_node, node)
        }
        JunctionRule::FarTurnOnRed => {
            default_turn_on_red_allowed(ctx, false, segment_id, start_node, node)
        }
        JunctionRule::LaneChangingWhenGoingStraight => {
            default_lane_changing_allowed(ctx, segment_id, start_node, node)
        }
        JunctionRule::EnteringBlockedJunction => {
            default_entering_blocked_allowed(ctx, segment_id, start_node, node)
        }
        JunctionRule::PedestrianCrossing => {
            default_pedestrian_crossing_allowed(ctx, segment_id, start_node, node)
        }
    }
}

/// Recompute the defaults of one segment end in place.
///
/// Overrides of rules that are no longer configurable are dropped first;
/// the remaining overrides are left untouched.
pub fn apply_defaults(
    ctx: &RuleContext,
    segment_id: SegmentId,
    start_node: bool,
    node: &NodeSnapshot,
    flags: &mut SegmentEndFlags,
) {
    for rule in JunctionRule::ALL {
        if flags.get_override(rule).is_set()
            && !is_configurable(ctx, rule, segment_id, start_node, node)
        {
            debug!(
                "Junction restrictions: dropping {} override at segment {} (start={}), no longer configurable at node {}",
                rule.name(),
                segment_id.0,
                start_node,
                node.node_id.0
            );
            flags.set_override(rule, TernaryFlag::Unset);
        }
    }

    for rule in JunctionRule::ALL {
        let value = default_allowed(ctx, rule, segment_id, start_node, node);
        flags.set_default(rule, value);
    }
}
