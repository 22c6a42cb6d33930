//! Identifiers and value types shared between the road topology and the
//! junction rule engine.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl SegmentId {
    /// Slot 0 is never a valid segment.
    pub const NONE: SegmentId = SegmentId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl NodeId {
    /// Slot 0 is never a valid node.
    pub const NONE: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One directed endpoint of a segment: its start-node side or end-node side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentEndId {
    pub segment_id: SegmentId,
    pub start_node: bool,
}

impl SegmentEndId {
    pub fn new(segment_id: SegmentId, start_node: bool) -> Self {
        Self {
            segment_id,
            start_node,
        }
    }
}

// =============================================================================
// Node flags
// =============================================================================

/// Topology flags of a node, as seen by the rule predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFlags(pub u16);

impl NodeFlags {
    pub const NONE: NodeFlags = NodeFlags(0);
    pub const JUNCTION: NodeFlags = NodeFlags(1 << 0);
    pub const BEND: NodeFlags = NodeFlags(1 << 1);
    pub const TRANSITION: NodeFlags = NodeFlags(1 << 2);
    pub const END: NodeFlags = NodeFlags(1 << 3);
    pub const ONE_WAY_IN: NodeFlags = NodeFlags(1 << 4);
    pub const ONE_WAY_OUT: NodeFlags = NodeFlags(1 << 5);
    pub const TRAFFIC_LIGHTS: NodeFlags = NodeFlags(1 << 6);
    pub const UNTOUCHABLE: NodeFlags = NodeFlags(1 << 7);

    /// Flags describing the node's shape, derived from its segment count.
    pub const SHAPE: NodeFlags = NodeFlags(Self::JUNCTION.0 | Self::BEND.0 | Self::END.0);

    /// All bits of `other` are set.
    pub fn contains(self, other: NodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` is set.
    pub fn intersects(self, other: NodeFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Only the bits shared with `mask`.
    pub fn masked(self, mask: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 & mask.0)
    }

    pub fn without(self, other: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for NodeFlags {
    type Output = NodeFlags;

    fn bitor(self, rhs: NodeFlags) -> NodeFlags {
        NodeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeFlags {
    fn bitor_assign(&mut self, rhs: NodeFlags) {
        self.0 |= rhs.0;
    }
}

/// Service class of the asset placed at a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceClass {
    #[default]
    Road,
    /// Decorative paths and plazas. Never host junction restrictions.
    Beautification,
}

impl ServiceClass {
    pub fn is_beautification(self) -> bool {
        self == ServiceClass::Beautification
    }
}

// =============================================================================
// Snapshots handed to the predicates
// =============================================================================

/// Read-only copy of everything the rule predicates need to know about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    /// Effective flags: explicit flags plus the shape derived from the
    /// segment count.
    pub flags: NodeFlags,
    pub service: ServiceClass,
    pub segment_count: usize,
    /// Vehicle lanes leaving the node, summed over all adjoining segments.
    pub outgoing_vehicle_lanes: u32,
    /// Vehicle lanes arriving at the node, summed over all adjoining segments.
    pub incoming_vehicle_lanes: u32,
}

/// Direction-of-travel facts about one segment end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentEndGeometry {
    /// The whole segment carries traffic in one direction only.
    pub one_way: bool,
    /// Vehicles can leave the node along this segment.
    pub outgoing: bool,
    /// Vehicles can arrive at the node along this segment.
    pub incoming: bool,
}

impl SegmentEndGeometry {
    /// The end of a one-way segment whose traffic flows away from the node.
    pub fn is_outgoing_one_way(&self) -> bool {
        self.one_way && self.outgoing
    }
}

/// Neighbouring segments a vehicle waiting at a red light could turn into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOnRedNeighbors {
    pub left: Option<SegmentId>,
    pub right: Option<SegmentId>,
}

/// Relative direction of an outgoing segment seen from an incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrowDirection {
    Left,
    Forward,
    Right,
    /// Turning back into (almost) the direction the vehicle came from.
    Turn,
}
