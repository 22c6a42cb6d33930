use bevy::prelude::*;

use crate::road_topology::{NodeId, SegmentEndId, SegmentId};

use super::flags::JunctionRule;

// =============================================================================
// Topology notifications (in)
// =============================================================================

/// Sent by the network owner after a segment was created or changed shape.
#[derive(Event, Debug, Clone, Copy)]
pub struct SegmentBecameValid {
    pub segment_id: SegmentId,
}

/// Sent by the network owner after a segment was removed. `nodes` are the
/// start and end node it was attached to; the remaining segments there are
/// recomputed.
#[derive(Event, Debug, Clone, Copy)]
pub struct SegmentBecameInvalid {
    pub segment_id: SegmentId,
    pub nodes: [NodeId; 2],
}

/// A segment end took over the role of an invalidated one (split, merge,
/// reconnect).
#[derive(Event, Debug, Clone, Copy)]
pub struct SegmentEndReplaced {
    pub old_end: SegmentEndId,
    pub new_end: SegmentEndId,
}

// =============================================================================
// Tool requests (in)
// =============================================================================

/// Set an override from a tool.
#[derive(Event, Debug, Clone, Copy)]
pub struct SetJunctionRestrictionEvent {
    pub segment_id: SegmentId,
    pub start_node: bool,
    pub rule: JunctionRule,
    pub allowed: bool,
}

/// Flip the effective value of a rule from a tool.
#[derive(Event, Debug, Clone, Copy)]
pub struct ToggleJunctionRestrictionEvent {
    pub segment_id: SegmentId,
    pub start_node: bool,
    pub rule: JunctionRule,
}

// =============================================================================
// Downstream notifications (out)
// =============================================================================

/// Routing must recompute paths through this segment.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingRecalculationRequested {
    pub segment_id: SegmentId,
}

/// Listeners should refresh whatever they derived from this segment.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentChangesPublished {
    pub segment_id: SegmentId,
}

/// A set or toggle request was refused: the segment is invalid or the change
/// was vetoed.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionRestrictionRejected {
    pub segment_id: SegmentId,
    pub start_node: bool,
    pub rule: JunctionRule,
}
