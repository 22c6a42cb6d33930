use super::types::{
    NodeId, NodeSnapshot, SegmentEndGeometry, SegmentId, TurnOnRedNeighbors,
};

/// Read-only view of the road network consumed by the junction rule engine.
///
/// Implementations answer from their current state; the engine never holds
/// references into them across calls.
pub trait NetworkView {
    fn is_segment_valid(&self, segment_id: SegmentId) -> bool;

    fn is_node_valid(&self, node_id: NodeId) -> bool;

    /// Number of node slots, including the reserved slot 0.
    fn node_capacity(&self) -> usize;

    /// Node at the start (`start_node == true`) or end of a valid segment.
    fn segment_node(&self, segment_id: SegmentId, start_node: bool) -> Option<NodeId>;

    /// Segments adjoining a node. Empty for invalid nodes.
    fn node_segments(&self, node_id: NodeId) -> &[SegmentId];

    fn node_snapshot(&self, node_id: NodeId) -> Option<NodeSnapshot>;

    fn segment_end_geometry(
        &self,
        segment_id: SegmentId,
        start_node: bool,
    ) -> Option<SegmentEndGeometry>;

    /// Turn-on-red neighbour table for a segment end. Both sides are `None`
    /// for ends vehicles cannot arrive through.
    fn turn_on_red_neighbors(&self, segment_id: SegmentId, start_node: bool)
        -> TurnOnRedNeighbors;

    /// Whether `node_id` is the start node of `segment_id`.
    fn is_start_node(&self, segment_id: SegmentId, node_id: NodeId) -> bool {
        self.segment_node(segment_id, true) == Some(node_id)
    }
}
