//! Road network store consumed by the junction rule engine.
//!
//! The engine only talks to the network through [`NetworkView`]. The
//! [`RoadTopology`] resource is the in-process implementation: an arena of
//! nodes and segments with per-direction vehicle lane counts, explicit node
//! flags, and the turn geometry (left/forward/right classification and the
//! turn-on-red neighbour table) derived from node positions.

pub mod store;
pub mod types;
pub mod view;

#[cfg(test)]
mod tests;

pub use store::{RoadTopology, SegmentSplit, TopologyNode, TopologySegment};
pub use types::{
    ArrowDirection, NodeFlags, NodeId, NodeSnapshot, SegmentEndGeometry, SegmentEndId, SegmentId,
    ServiceClass, TurnOnRedNeighbors,
};
pub use view::NetworkView;
