use bevy::prelude::*;
use std::f32::consts::PI;

use crate::config::{MAX_NODE_COUNT, MAX_SEGMENT_COUNT};

use super::types::{
    ArrowDirection, NodeFlags, NodeId, NodeSnapshot, SegmentEndGeometry, SegmentEndId, SegmentId,
    ServiceClass, TurnOnRedNeighbors,
};
use super::view::NetworkView;

/// Turns within this angle of straight ahead count as going forward.
const FORWARD_TOLERANCE: f32 = PI / 4.0;
/// Turns sharper than this angle count as turning around.
const TURN_AROUND_THRESHOLD: f32 = PI * 5.0 / 6.0;

#[derive(Debug, Clone)]
pub struct TopologyNode {
    pub id: NodeId,
    pub position: Vec2,
    /// Explicitly assigned flags. Shape flags are derived on top of these.
    pub flags: NodeFlags,
    pub service: ServiceClass,
    pub segments: Vec<SegmentId>,
}

#[derive(Debug, Clone)]
pub struct TopologySegment {
    pub id: SegmentId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    /// Vehicle lanes travelling from the start node to the end node.
    pub forward_lanes: u8,
    /// Vehicle lanes travelling from the end node to the start node.
    pub backward_lanes: u8,
}

impl TopologySegment {
    pub fn node(&self, start_node: bool) -> NodeId {
        if start_node {
            self.start_node
        } else {
            self.end_node
        }
    }

    pub fn other_node(&self, node_id: NodeId) -> NodeId {
        if node_id == self.start_node {
            self.end_node
        } else {
            self.start_node
        }
    }

    /// Vehicle lanes carry traffic in exactly one direction.
    pub fn is_one_way(&self) -> bool {
        (self.forward_lanes == 0) != (self.backward_lanes == 0)
    }

    pub fn lanes_leaving(&self, node_id: NodeId) -> u8 {
        if node_id == self.start_node {
            self.forward_lanes
        } else {
            self.backward_lanes
        }
    }

    pub fn lanes_arriving(&self, node_id: NodeId) -> u8 {
        if node_id == self.start_node {
            self.backward_lanes
        } else {
            self.forward_lanes
        }
    }
}

/// Result of [`RoadTopology::split_segment`]: which new segment ends took
/// over the roles of the removed segment's ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSplit {
    pub removed: SegmentId,
    pub node: NodeId,
    /// Runs from the old start node to the new node.
    pub first: SegmentId,
    /// Runs from the new node to the old end node.
    pub second: SegmentId,
}

impl SegmentSplit {
    /// `(old, new)` segment-end pairs for the replacement notifications.
    pub fn replacements(&self) -> [(SegmentEndId, SegmentEndId); 2] {
        [
            (
                SegmentEndId::new(self.removed, true),
                SegmentEndId::new(self.first, true),
            ),
            (
                SegmentEndId::new(self.removed, false),
                SegmentEndId::new(self.second, false),
            ),
        ]
    }
}

/// Arena-backed node/segment store. Ids are slot indices, slot 0 is never
/// used, and freed slots are reused lowest-first.
#[derive(Resource, Debug, Clone)]
pub struct RoadTopology {
    nodes: Vec<Option<TopologyNode>>,
    segments: Vec<Option<TopologySegment>>,
    node_capacity: usize,
    segment_capacity: usize,
}

impl Default for RoadTopology {
    fn default() -> Self {
        Self::with_capacity(MAX_SEGMENT_COUNT, MAX_NODE_COUNT)
    }
}

impl RoadTopology {
    pub fn with_capacity(segment_capacity: usize, node_capacity: usize) -> Self {
        Self {
            nodes: vec![None],
            segments: vec![None],
            node_capacity,
            segment_capacity,
        }
    }

    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn node(&self, node_id: NodeId) -> Option<&TopologyNode> {
        self.nodes.get(node_id.index()).and_then(Option::as_ref)
    }

    pub fn segment(&self, segment_id: SegmentId) -> Option<&TopologySegment> {
        self.segments.get(segment_id.index()).and_then(Option::as_ref)
    }

    pub fn segments(&self) -> impl Iterator<Item = &TopologySegment> {
        self.segments.iter().flatten()
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    pub fn add_node(&mut self, position: Vec2) -> Option<NodeId> {
        let slot = free_slot(&self.nodes, self.node_capacity)?;
        let id = NodeId(slot as u32);
        let node = TopologyNode {
            id,
            position,
            flags: NodeFlags::NONE,
            service: ServiceClass::Road,
            segments: Vec::new(),
        };
        store_slot(&mut self.nodes, slot, node);
        Some(id)
    }

    /// Remove a node that no longer has any segments attached.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<TopologyNode> {
        if node_id == NodeId::NONE || !self.node(node_id)?.segments.is_empty() {
            return None;
        }
        self.nodes.get_mut(node_id.index())?.take()
    }

    /// Replace the explicitly assigned flags of a node.
    pub fn set_node_flags(&mut self, node_id: NodeId, flags: NodeFlags) -> bool {
        match self.node_mut(node_id) {
            Some(node) => {
                node.flags = flags;
                true
            }
            None => false,
        }
    }

    pub fn insert_node_flags(&mut self, node_id: NodeId, flags: NodeFlags) -> bool {
        match self.node_mut(node_id) {
            Some(node) => {
                node.flags |= flags;
                true
            }
            None => false,
        }
    }

    pub fn set_node_service(&mut self, node_id: NodeId, service: ServiceClass) -> bool {
        match self.node_mut(node_id) {
            Some(node) => {
                node.service = service;
                true
            }
            None => false,
        }
    }

    pub fn add_segment(
        &mut self,
        start_node: NodeId,
        end_node: NodeId,
        forward_lanes: u8,
        backward_lanes: u8,
    ) -> Option<SegmentId> {
        if start_node == end_node || self.node(start_node).is_none() || self.node(end_node).is_none()
        {
            return None;
        }
        let slot = free_slot(&self.segments, self.segment_capacity)?;
        let id = SegmentId(slot as u32);
        store_slot(
            &mut self.segments,
            slot,
            TopologySegment {
                id,
                start_node,
                end_node,
                forward_lanes,
                backward_lanes,
            },
        );
        for node_id in [start_node, end_node] {
            if let Some(node) = self.node_mut(node_id) {
                node.segments.push(id);
            }
        }
        Some(id)
    }

    pub fn remove_segment(&mut self, segment_id: SegmentId) -> Option<TopologySegment> {
        if segment_id == SegmentId::NONE {
            return None;
        }
        let segment = self.segments.get_mut(segment_id.index())?.take()?;
        for node_id in [segment.start_node, segment.end_node] {
            if let Some(node) = self.node_mut(node_id) {
                node.segments.retain(|&s| s != segment_id);
            }
        }
        Some(segment)
    }

    pub fn set_segment_lanes(
        &mut self,
        segment_id: SegmentId,
        forward_lanes: u8,
        backward_lanes: u8,
    ) -> bool {
        match self
            .segments
            .get_mut(segment_id.index())
            .and_then(Option::as_mut)
        {
            Some(segment) => {
                segment.forward_lanes = forward_lanes;
                segment.backward_lanes = backward_lanes;
                true
            }
            None => false,
        }
    }

    /// Split a segment in two at `position`, inserting a new node there.
    ///
    /// The removed segment's id is freed first, so `first` may reuse it.
    pub fn split_segment(&mut self, segment_id: SegmentId, position: Vec2) -> Option<SegmentSplit> {
        let old = self.segment(segment_id)?.clone();
        let node = self.add_node(position)?;
        self.remove_segment(segment_id);
        let Some(first) = self.add_segment(
            old.start_node,
            node,
            old.forward_lanes,
            old.backward_lanes,
        ) else {
            self.restore_segment(old);
            self.remove_node(node);
            return None;
        };
        let Some(second) =
            self.add_segment(node, old.end_node, old.forward_lanes, old.backward_lanes)
        else {
            self.remove_segment(first);
            self.restore_segment(old);
            self.remove_node(node);
            return None;
        };
        Some(SegmentSplit {
            removed: segment_id,
            node,
            first,
            second,
        })
    }

    fn restore_segment(&mut self, segment: TopologySegment) {
        let id = segment.id;
        let (start, end) = (segment.start_node, segment.end_node);
        store_slot(&mut self.segments, id.index(), segment);
        for node_id in [start, end] {
            if let Some(node) = self.node_mut(node_id) {
                node.segments.push(id);
            }
        }
    }

    fn node_mut(&mut self, node_id: NodeId) -> Option<&mut TopologyNode> {
        if node_id == NodeId::NONE {
            return None;
        }
        self.nodes.get_mut(node_id.index()).and_then(Option::as_mut)
    }

    // -------------------------------------------------------------------------
    // Derived geometry
    // -------------------------------------------------------------------------

    /// Explicit flags plus the shape implied by the segment count:
    /// one segment is an end, two a bend, three or more a junction.
    /// An explicit junction is never also reported as a bend.
    pub fn effective_node_flags(&self, node_id: NodeId) -> Option<NodeFlags> {
        let node = self.node(node_id)?;
        let shape = match node.segments.len() {
            0 => NodeFlags::NONE,
            1 => NodeFlags::END,
            2 if node.flags.contains(NodeFlags::JUNCTION) => NodeFlags::NONE,
            2 => NodeFlags::BEND,
            _ => NodeFlags::JUNCTION,
        };
        Some(node.flags | shape)
    }

    /// Direction of travel from the incoming segment end `from` into `to`.
    ///
    /// Angles are measured in the XY plane with Y up, so a counter-clockwise
    /// turn is a left turn.
    pub fn classify_turn(&self, from: SegmentEndId, to: SegmentId) -> Option<ArrowDirection> {
        let angle = self.turn_angle(from, to)?;
        let abs = angle.abs();
        Some(if abs <= FORWARD_TOLERANCE {
            ArrowDirection::Forward
        } else if abs >= TURN_AROUND_THRESHOLD {
            ArrowDirection::Turn
        } else if angle > 0.0 {
            ArrowDirection::Left
        } else {
            ArrowDirection::Right
        })
    }

    /// Left/forward/right classification of every segment a vehicle arriving
    /// through `segment_id` at its start or end node may leave by.
    pub fn outgoing_directions(
        &self,
        segment_id: SegmentId,
        start_node: bool,
    ) -> Vec<(SegmentId, ArrowDirection)> {
        let from = SegmentEndId::new(segment_id, start_node);
        self.outgoing_candidates(from)
            .filter_map(|target| Some((target, self.classify_turn(from, target)?)))
            .collect()
    }

    /// Signed turn angle in radians, positive to the left.
    fn turn_angle(&self, from: SegmentEndId, to: SegmentId) -> Option<f32> {
        let source = self.segment(from.segment_id)?;
        let target = self.segment(to)?;
        let node_id = source.node(from.start_node);
        if target.start_node != node_id && target.end_node != node_id {
            return None;
        }
        let node_pos = self.node(node_id)?.position;
        let heading = node_pos - self.node(source.other_node(node_id))?.position;
        let leaving = self.node(target.other_node(node_id))?.position - node_pos;
        if heading.length_squared() <= f32::EPSILON || leaving.length_squared() <= f32::EPSILON {
            return None;
        }
        Some(heading.perp_dot(leaving).atan2(heading.dot(leaving)))
    }

    /// Other segments at the node of `from` that carry traffic away from it.
    fn outgoing_candidates(&self, from: SegmentEndId) -> impl Iterator<Item = SegmentId> + '_ {
        let node_id = self
            .segment(from.segment_id)
            .map(|s| s.node(from.start_node))
            .unwrap_or(NodeId::NONE);
        self.node(node_id)
            .map(|n| n.segments.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(move |&s| s != from.segment_id)
            .filter(move |&s| {
                self.segment(s)
                    .is_some_and(|seg| seg.lanes_leaving(node_id) > 0)
            })
    }
}

impl NetworkView for RoadTopology {
    fn is_segment_valid(&self, segment_id: SegmentId) -> bool {
        segment_id != SegmentId::NONE && self.segment(segment_id).is_some()
    }

    fn is_node_valid(&self, node_id: NodeId) -> bool {
        node_id != NodeId::NONE && self.node(node_id).is_some()
    }

    fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    fn segment_node(&self, segment_id: SegmentId, start_node: bool) -> Option<NodeId> {
        self.segment(segment_id).map(|s| s.node(start_node))
    }

    fn node_segments(&self, node_id: NodeId) -> &[SegmentId] {
        self.node(node_id)
            .map(|n| n.segments.as_slice())
            .unwrap_or(&[])
    }

    fn node_snapshot(&self, node_id: NodeId) -> Option<NodeSnapshot> {
        let node = self.node(node_id)?;
        let flags = self.effective_node_flags(node_id)?;
        let mut outgoing_vehicle_lanes = 0;
        let mut incoming_vehicle_lanes = 0;
        for segment in node.segments.iter().filter_map(|&s| self.segment(s)) {
            outgoing_vehicle_lanes += u32::from(segment.lanes_leaving(node_id));
            incoming_vehicle_lanes += u32::from(segment.lanes_arriving(node_id));
        }
        Some(NodeSnapshot {
            node_id,
            flags,
            service: node.service,
            segment_count: node.segments.len(),
            outgoing_vehicle_lanes,
            incoming_vehicle_lanes,
        })
    }

    fn segment_end_geometry(
        &self,
        segment_id: SegmentId,
        start_node: bool,
    ) -> Option<SegmentEndGeometry> {
        let segment = self.segment(segment_id)?;
        let node_id = segment.node(start_node);
        Some(SegmentEndGeometry {
            one_way: segment.is_one_way(),
            outgoing: segment.lanes_leaving(node_id) > 0,
            incoming: segment.lanes_arriving(node_id) > 0,
        })
    }

    fn turn_on_red_neighbors(
        &self,
        segment_id: SegmentId,
        start_node: bool,
    ) -> TurnOnRedNeighbors {
        let incoming = self
            .segment_end_geometry(segment_id, start_node)
            .is_some_and(|g| g.incoming);
        if !incoming {
            return TurnOnRedNeighbors::default();
        }

        // The adjacent segment on each side is the sharpest turn on that side;
        // it only counts when that turn actually is a left/right turn.
        let from = SegmentEndId::new(segment_id, start_node);
        let mut left: Option<(SegmentId, f32)> = None;
        let mut right: Option<(SegmentId, f32)> = None;
        for target in self.outgoing_candidates(from) {
            let Some(angle) = self.turn_angle(from, target) else {
                continue;
            };
            if left.is_none_or(|(_, best)| angle > best) {
                left = Some((target, angle));
            }
            if right.is_none_or(|(_, best)| angle < best) {
                right = Some((target, angle));
            }
        }

        let keep = |candidate: Option<(SegmentId, f32)>, wanted: ArrowDirection| {
            candidate
                .map(|(target, _)| target)
                .filter(|&target| self.classify_turn(from, target) == Some(wanted))
        };
        TurnOnRedNeighbors {
            left: keep(left, ArrowDirection::Left),
            right: keep(right, ArrowDirection::Right),
        }
    }
}

/// Lowest free slot above 0, growing the arena up to `capacity`.
fn free_slot<T>(slots: &[Option<T>], capacity: usize) -> Option<usize> {
    match slots.iter().skip(1).position(Option::is_none) {
        Some(offset) => Some(offset + 1),
        None if slots.len() < capacity => Some(slots.len()),
        None => None,
    }
}

fn store_slot<T>(slots: &mut Vec<Option<T>>, slot: usize, value: T) {
    if slot >= slots.len() {
        slots.resize_with(slot + 1, || None);
    }
    slots[slot] = Some(value);
}
