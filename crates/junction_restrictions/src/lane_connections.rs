//! Lane-connection facts the junction rule engine needs to respect.
//!
//! User-authored lane connections that route a lane back into its own
//! segment depend on U-turns being permitted at that segment end. Disabling
//! the U-turn there would orphan them, so the engine asks first.

use bevy::prelude::*;
use std::collections::HashSet;

use crate::road_topology::{SegmentEndId, SegmentId};

/// Query side of the lane-connection subsystem.
pub trait LaneConnectionQuery {
    /// Whether this segment end has lane connections that only work while
    /// U-turns are allowed there.
    fn has_uturn_connections(&self, segment_id: SegmentId, start_node: bool) -> bool;
}

/// Segment ends that currently own U-turn lane connections.
#[derive(Resource, Default, Debug, Clone)]
pub struct UturnLaneConnections {
    ends: HashSet<SegmentEndId>,
}

impl UturnLaneConnections {
    pub fn add(&mut self, segment_id: SegmentId, start_node: bool) {
        self.ends.insert(SegmentEndId::new(segment_id, start_node));
    }

    pub fn remove(&mut self, segment_id: SegmentId, start_node: bool) -> bool {
        self.ends.remove(&SegmentEndId::new(segment_id, start_node))
    }

    /// Drop every connection of a segment, e.g. after it was removed.
    pub fn clear_segment(&mut self, segment_id: SegmentId) {
        self.ends.retain(|end| end.segment_id != segment_id);
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }
}

impl LaneConnectionQuery for UturnLaneConnections {
    fn has_uturn_connections(&self, segment_id: SegmentId, start_node: bool) -> bool {
        self.ends
            .contains(&SegmentEndId::new(segment_id, start_node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_are_tracked_per_segment_end() {
        let mut connections = UturnLaneConnections::default();
        connections.add(SegmentId(4), true);

        assert!(connections.has_uturn_connections(SegmentId(4), true));
        assert!(!connections.has_uturn_connections(SegmentId(4), false));
        assert!(!connections.has_uturn_connections(SegmentId(5), true));
    }

    #[test]
    fn test_clear_segment_drops_both_ends() {
        let mut connections = UturnLaneConnections::default();
        connections.add(SegmentId(4), true);
        connections.add(SegmentId(4), false);
        connections.add(SegmentId(9), true);

        connections.clear_segment(SegmentId(4));
        assert_eq!(connections.len(), 1);
        assert!(connections.remove(SegmentId(9), true));
        assert!(connections.is_empty());
    }
}
