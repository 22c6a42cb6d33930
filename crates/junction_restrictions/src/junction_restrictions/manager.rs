//! The junction restriction manager: live and quarantined flag tables plus
//! the operations that keep them consistent with the road network.

use bevy::prelude::*;

use crate::config::MAX_SEGMENT_COUNT;
use crate::road_topology::{NetworkView, NodeFlags, NodeId, NodeSnapshot, SegmentEndId, SegmentId};

use super::flags::{JunctionRule, SegmentEndFlags, SegmentFlags, TernaryFlag};
use super::predicates::{self, RuleContext};

/// Downstream work requested by a flag change, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunctionNotification {
    /// Path legality at this segment changed.
    RecalculateRouting(SegmentId),
    /// Listeners should be told the segment changed.
    PublishSegmentChanges(SegmentId),
}

/// Junction restrictions for every segment end in the network.
///
/// Both tables are fixed-size arenas indexed by `SegmentId`; slot 0 is never
/// used. The quarantine table holds the overrides of segments that went
/// invalid until a replacement segment end claims them.
#[derive(Resource, Debug, Clone)]
pub struct JunctionRestrictionsManager {
    segment_flags: Vec<SegmentFlags>,
    invalid_segment_flags: Vec<SegmentFlags>,
    notifications: Vec<JunctionNotification>,
    /// Incremented every time the tables change, so systems can detect changes cheaply.
    generation: u32,
}

impl Default for JunctionRestrictionsManager {
    fn default() -> Self {
        Self::with_capacity(MAX_SEGMENT_COUNT)
    }
}

/// Generates the per-rule named accessors on top of the rule-generic API.
macro_rules! rule_accessors {
    (
        $rule:expr,
        $is_configurable:ident,
        $get_default:ident,
        $is_allowed:ident,
        $get_allowed:ident,
        $set_allowed:ident,
        $toggle_allowed:ident
    ) => {
        pub fn $is_configurable(
            &self,
            ctx: &RuleContext,
            segment_id: SegmentId,
            start_node: bool,
            node: &NodeSnapshot,
        ) -> bool {
            predicates::is_configurable(ctx, $rule, segment_id, start_node, node)
        }

        pub fn $get_default(
            &self,
            ctx: &RuleContext,
            segment_id: SegmentId,
            start_node: bool,
            node: &NodeSnapshot,
        ) -> bool {
            predicates::default_allowed(ctx, $rule, segment_id, start_node, node)
        }

        pub fn $is_allowed(&self, segment_id: SegmentId, start_node: bool) -> bool {
            self.is_allowed($rule, segment_id, start_node)
        }

        pub fn $get_allowed(&self, segment_id: SegmentId, start_node: bool) -> TernaryFlag {
            self.get_allowed($rule, segment_id, start_node)
        }

        pub fn $set_allowed(
            &mut self,
            ctx: &RuleContext,
            segment_id: SegmentId,
            start_node: bool,
            value: bool,
        ) -> bool {
            self.set_allowed(ctx, $rule, segment_id, start_node, value)
        }

        pub fn $toggle_allowed(
            &mut self,
            ctx: &RuleContext,
            segment_id: SegmentId,
            start_node: bool,
        ) -> bool {
            self.toggle_allowed(ctx, $rule, segment_id, start_node)
        }
    };
}

impl JunctionRestrictionsManager {
    /// Tables with room for `capacity` segment slots (slot 0 included).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            segment_flags: vec![SegmentFlags::default(); capacity],
            invalid_segment_flags: vec![SegmentFlags::default(); capacity],
            notifications: Vec::new(),
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.segment_flags.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Copy of the live flags of a segment.
    pub fn segment_flags(&self, segment_id: SegmentId) -> Option<SegmentFlags> {
        self.segment_flags.get(segment_id.index()).copied()
    }

    /// Copy of the quarantined flags of a segment.
    pub fn quarantined_flags(&self, segment_id: SegmentId) -> Option<SegmentFlags> {
        self.invalid_segment_flags.get(segment_id.index()).copied()
    }

    /// Copy of the live flags of one segment end. Out-of-range ids read as
    /// all-default.
    pub fn end_flags(&self, segment_id: SegmentId, start_node: bool) -> SegmentEndFlags {
        self.segment_flags
            .get(segment_id.index())
            .map(|flags| *flags.end(start_node))
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Rule-generic queries
    // -------------------------------------------------------------------------

    /// Effective value: the override when set, otherwise the default.
    pub fn is_allowed(&self, rule: JunctionRule, segment_id: SegmentId, start_node: bool) -> bool {
        self.end_flags(segment_id, start_node).is_allowed(rule)
    }

    /// Raw override, `Unset` when the default applies.
    pub fn get_allowed(
        &self,
        rule: JunctionRule,
        segment_id: SegmentId,
        start_node: bool,
    ) -> TernaryFlag {
        self.end_flags(segment_id, start_node).get_override(rule)
    }

    pub fn is_configurable(
        &self,
        ctx: &RuleContext,
        rule: JunctionRule,
        segment_id: SegmentId,
        start_node: bool,
        node: &NodeSnapshot,
    ) -> bool {
        predicates::is_configurable(ctx, rule, segment_id, start_node, node)
    }

    pub fn get_default_allowed(
        &self,
        ctx: &RuleContext,
        rule: JunctionRule,
        segment_id: SegmentId,
        start_node: bool,
        node: &NodeSnapshot,
    ) -> bool {
        predicates::default_allowed(ctx, rule, segment_id, start_node, node)
    }

    // -------------------------------------------------------------------------
    // Rule-generic mutation
    // -------------------------------------------------------------------------

    /// Store an override for one segment end.
    ///
    /// Returns `false` without touching anything when the segment is invalid
    /// or when disabling a U-turn would orphan U-turn lane connections.
    pub fn set_allowed(
        &mut self,
        ctx: &RuleContext,
        rule: JunctionRule,
        segment_id: SegmentId,
        start_node: bool,
        value: bool,
    ) -> bool {
        if !ctx.network.is_segment_valid(segment_id) {
            return false;
        }
        let Some(index) = self.slot(segment_id) else {
            return false;
        };

        if rule == JunctionRule::UTurn
            && !value
            && ctx
                .lane_connections
                .has_uturn_connections(segment_id, start_node)
        {
            debug!(
                "Junction restrictions: refusing to disallow u-turns at segment {} (start={}), u-turn lane connections exist",
                segment_id.0, start_node
            );
            return false;
        }

        self.segment_flags[index]
            .end_mut(start_node)
            .set_override(rule, TernaryFlag::from(value));
        self.bump_generation();
        self.on_segment_change(ctx, segment_id, rule.requires_recalculation());
        true
    }

    pub fn toggle_allowed(
        &mut self,
        ctx: &RuleContext,
        rule: JunctionRule,
        segment_id: SegmentId,
        start_node: bool,
    ) -> bool {
        let value = !self.is_allowed(rule, segment_id, start_node);
        self.set_allowed(ctx, rule, segment_id, start_node, value)
    }

    rule_accessors!(
        JunctionRule::UTurn,
        is_uturn_allowed_configurable,
        get_default_uturn_allowed,
        is_uturn_allowed,
        get_uturn_allowed,
        set_uturn_allowed,
        toggle_uturn_allowed
    );

    rule_accessors!(
        JunctionRule::NearTurnOnRed,
        is_near_turn_on_red_allowed_configurable,
        get_default_near_turn_on_red_allowed,
        is_near_turn_on_red_allowed,
        get_near_turn_on_red_allowed,
        set_near_turn_on_red_allowed,
        toggle_near_turn_on_red_allowed
    );

    rule_accessors!(
        JunctionRule::FarTurnOnRed,
        is_far_turn_on_red_allowed_configurable,
        get_default_far_turn_on_red_allowed,
        is_far_turn_on_red_allowed,
        get_far_turn_on_red_allowed,
        set_far_turn_on_red_allowed,
        toggle_far_turn_on_red_allowed
    );

    rule_accessors!(
        JunctionRule::LaneChangingWhenGoingStraight,
        is_lane_changing_allowed_when_going_straight_configurable,
        get_default_lane_changing_allowed_when_going_straight,
        is_lane_changing_allowed_when_going_straight,
        get_lane_changing_allowed_when_going_straight,
        set_lane_changing_allowed_when_going_straight,
        toggle_lane_changing_allowed_when_going_straight
    );

    rule_accessors!(
        JunctionRule::EnteringBlockedJunction,
        is_entering_blocked_junction_allowed_configurable,
        get_default_entering_blocked_junction_allowed,
        is_entering_blocked_junction_allowed,
        get_entering_blocked_junction_allowed,
        set_entering_blocked_junction_allowed,
        toggle_entering_blocked_junction_allowed
    );

    rule_accessors!(
        JunctionRule::PedestrianCrossing,
        is_pedestrian_crossing_allowed_configurable,
        get_default_pedestrian_crossing_allowed,
        is_pedestrian_crossing_allowed,
        get_pedestrian_crossing_allowed,
        set_pedestrian_crossing_allowed,
        toggle_pedestrian_crossing_allowed
    );

    /// Turn-on-red by side, `near == true` meaning the drive side.
    pub fn is_turn_on_red_allowed(&self, near: bool, segment_id: SegmentId, start_node: bool) -> bool {
        self.is_allowed(turn_on_red_rule(near), segment_id, start_node)
    }

    pub fn set_turn_on_red_allowed(
        &mut self,
        ctx: &RuleContext,
        near: bool,
        segment_id: SegmentId,
        start_node: bool,
        value: bool,
    ) -> bool {
        self.set_allowed(ctx, turn_on_red_rule(near), segment_id, start_node, value)
    }

    pub fn toggle_turn_on_red_allowed(
        &mut self,
        ctx: &RuleContext,
        near: bool,
        segment_id: SegmentId,
        start_node: bool,
    ) -> bool {
        self.toggle_allowed(ctx, turn_on_red_rule(near), segment_id, start_node)
    }

    // -------------------------------------------------------------------------
    // Node-level queries
    // -------------------------------------------------------------------------

    /// Whether any segment end at the node carries an override.
    pub fn has_junction_restrictions(&self, network: &dyn NetworkView, node_id: NodeId) -> bool {
        if !network.is_node_valid(node_id) {
            return false;
        }

        network
            .node_segments(node_id)
            .iter()
            .filter(|&&segment_id| segment_id != SegmentId::NONE)
            .any(|&segment_id| {
                let start_node = network.is_start_node(segment_id, node_id);
                !self.end_flags(segment_id, start_node).is_default()
            })
    }

    /// Only junctions and bends can carry restrictions at all.
    pub fn may_have_junction_restrictions(&self, network: &dyn NetworkView, node_id: NodeId) -> bool {
        network.is_node_valid(node_id)
            && network
                .node_snapshot(node_id)
                .is_some_and(|node| node.flags.intersects(NodeFlags::JUNCTION | NodeFlags::BEND))
    }

    /// Clear the overrides around a node that can no longer carry
    /// restrictions. Returns whether anything was cleared.
    pub fn remove_junction_restrictions_if_necessary(
        &mut self,
        network: &dyn NetworkView,
        node_id: NodeId,
    ) -> bool {
        if self.may_have_junction_restrictions(network, node_id) {
            return false;
        }
        self.remove_junction_restrictions(network, node_id)
    }

    /// Node sweep over the whole network. Returns the number of nodes whose
    /// restrictions were cleared.
    pub fn remove_all_junction_restrictions_if_necessary(&mut self, network: &dyn NetworkView) -> usize {
        let cleared = (1..network.node_capacity())
            .map(|index| NodeId(index as u32))
            .filter(|&node_id| self.remove_junction_restrictions_if_necessary(network, node_id))
            .count();
        if cleared > 0 {
            info!(
                "Junction restrictions: cleared restrictions at {} nodes that can no longer carry them",
                cleared
            );
        }
        cleared
    }

    fn remove_junction_restrictions(&mut self, network: &dyn NetworkView, node_id: NodeId) -> bool {
        let mut changed = false;
        for &segment_id in network.node_segments(node_id) {
            if segment_id == SegmentId::NONE {
                continue;
            }
            let start_node = network.is_start_node(segment_id, node_id);
            let Some(flags) = self.segment_flags.get_mut(segment_id.index()) else {
                continue;
            };
            if !flags.end(start_node).is_default() {
                flags.reset_end(start_node, false);
                changed = true;
            }
        }
        if changed {
            self.bump_generation();
        }
        changed
    }

    // -------------------------------------------------------------------------
    // Topology events
    // -------------------------------------------------------------------------

    /// A segment became valid: compute defaults for both of its ends, then
    /// for every other segment at its nodes, whose shape just changed.
    pub fn handle_valid_segment(&mut self, ctx: &RuleContext, segment_id: SegmentId) {
        self.update_defaults(ctx, segment_id);
        for start_node in [true, false] {
            if let Some(node_id) = ctx.network.segment_node(segment_id, start_node) {
                self.update_node_defaults(ctx, node_id);
            }
        }
    }

    /// A segment became invalid: move its ends into quarantine and clear the
    /// overrides of the live slot. Defaults stay as they were.
    ///
    /// The quarantine slot is always overwritten, so overrides of an earlier
    /// segment that used the same id can never be restored.
    pub fn handle_invalid_segment(&mut self, segment_id: SegmentId) {
        let Some(index) = self.slot(segment_id) else {
            return;
        };

        for start_node in [true, false] {
            let flags = *self.segment_flags[index].end(start_node);
            if !flags.is_default() {
                debug!(
                    "Junction restrictions: quarantining segment {} (start={})",
                    segment_id.0, start_node
                );
            }
            *self.invalid_segment_flags[index].end_mut(start_node) = flags;
            self.segment_flags[index].reset_end(start_node, false);
        }
        self.bump_generation();
    }

    /// Recompute every valid segment adjoining `node_id`. Used when a
    /// segment was added to or removed from the node.
    pub fn update_node_defaults(&mut self, ctx: &RuleContext, node_id: NodeId) {
        if !ctx.network.is_node_valid(node_id) {
            return;
        }
        for &segment_id in ctx.network.node_segments(node_id) {
            self.update_defaults(ctx, segment_id);
        }
    }

    /// A new segment end took over the role of an invalidated one. The
    /// quarantined overrides that are still configurable at the new end are
    /// applied to it; the quarantine slot is cleared either way.
    pub fn handle_segment_end_replacement(
        &mut self,
        ctx: &RuleContext,
        old_end: SegmentEndId,
        new_end: SegmentEndId,
    ) {
        let Some(old_index) = self.slot(old_end.segment_id) else {
            return;
        };

        let mut flags = std::mem::take(
            self.invalid_segment_flags[old_index].end_mut(old_end.start_node),
        );
        if flags.is_default() {
            return;
        }
        self.bump_generation();

        let Some(node) = ctx
            .network
            .segment_node(new_end.segment_id, new_end.start_node)
            .and_then(|node_id| ctx.network.node_snapshot(node_id))
        else {
            warn!(
                "Junction restrictions: cannot resolve node of replacement segment {} (start={}), dropping quarantined flags of segment {}",
                new_end.segment_id.0, new_end.start_node, old_end.segment_id.0
            );
            return;
        };

        debug!(
            "Junction restrictions: migrating flags of segment {} (start={}) to segment {} (start={})",
            old_end.segment_id.0, old_end.start_node, new_end.segment_id.0, new_end.start_node
        );
        predicates::apply_defaults(
            ctx,
            new_end.segment_id,
            new_end.start_node,
            &node,
            &mut flags,
        );
        self.set_segment_end_flags(ctx, new_end.segment_id, new_end.start_node, &flags);
    }

    /// Apply every set override of `flags` through [`Self::set_allowed`].
    fn set_segment_end_flags(
        &mut self,
        ctx: &RuleContext,
        segment_id: SegmentId,
        start_node: bool,
        flags: &SegmentEndFlags,
    ) {
        for rule in JunctionRule::ALL {
            if let Some(value) = flags.get_override(rule).to_option() {
                self.set_allowed(ctx, rule, segment_id, start_node, value);
            }
        }
    }

    /// Recompute both ends of a valid segment against the current network.
    pub fn update_defaults(&mut self, ctx: &RuleContext, segment_id: SegmentId) {
        if !ctx.network.is_segment_valid(segment_id) {
            return;
        }
        let Some(index) = self.slot(segment_id) else {
            return;
        };

        let mut changed = false;
        for start_node in [true, false] {
            let Some(node) = ctx
                .network
                .segment_node(segment_id, start_node)
                .and_then(|node_id| ctx.network.node_snapshot(node_id))
            else {
                warn!(
                    "Junction restrictions: no node snapshot for segment {} (start={})",
                    segment_id.0, start_node
                );
                continue;
            };

            let mut flags = *self.segment_flags[index].end(start_node);
            predicates::apply_defaults(ctx, segment_id, start_node, &node, &mut flags);
            let end = self.segment_flags[index].end_mut(start_node);
            if *end != flags {
                *end = flags;
                changed = true;
            }
        }

        if changed {
            self.bump_generation();
        }
    }

    /// Recompute defaults of every valid segment. Returns how many segments
    /// were visited.
    pub fn update_all_defaults(&mut self, ctx: &RuleContext) -> usize {
        let mut visited = 0;
        for index in 1..self.capacity() {
            let segment_id = SegmentId(index as u32);
            if ctx.network.is_segment_valid(segment_id) {
                self.update_defaults(ctx, segment_id);
                visited += 1;
            }
        }
        visited
    }

    /// Level-loading pass: bring every valid segment's defaults in line with
    /// the network that was just loaded.
    pub fn rebuild_all(&mut self, ctx: &RuleContext) {
        let visited = self.update_all_defaults(ctx);
        info!(
            "Junction restrictions: computed defaults for {} segments",
            visited
        );
    }

    /// Level unloading: forget everything, defaults and quarantine included.
    pub fn reset(&mut self) {
        for flags in self
            .segment_flags
            .iter_mut()
            .chain(self.invalid_segment_flags.iter_mut())
        {
            flags.reset(true);
        }
        self.notifications.clear();
        self.bump_generation();
    }

    /// Dump every segment with overrides at debug level.
    pub fn log_debug_info(&self) {
        let mut count = 0;
        for (index, flags) in self.segment_flags.iter().enumerate().skip(1) {
            if flags.is_default() {
                continue;
            }
            count += 1;
            debug!(
                "Junction restrictions: segment {}: start={:?} end={:?}",
                index, flags.start_node_flags, flags.end_node_flags
            );
        }
        debug!(
            "Junction restrictions: {} segments with overrides",
            count
        );
    }

    /// Take the notifications produced since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<JunctionNotification> {
        std::mem::take(&mut self.notifications)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn on_segment_change(&mut self, ctx: &RuleContext, segment_id: SegmentId, requires_recalc: bool) {
        self.update_defaults(ctx, segment_id);

        if requires_recalc {
            self.notifications
                .push(JunctionNotification::RecalculateRouting(segment_id));
            if ctx.config.may_publish_segment_changes {
                self.notifications
                    .push(JunctionNotification::PublishSegmentChanges(segment_id));
            }
        }
    }

    /// Table index of a segment, or `None` (with a warning) when the id does
    /// not fit the fixed capacity.
    pub(crate) fn slot(&self, segment_id: SegmentId) -> Option<usize> {
        let index = segment_id.index();
        if index == 0 {
            return None;
        }
        if index >= self.segment_flags.len() {
            warn!(
                "Junction restrictions: segment {} exceeds table capacity {}",
                segment_id.0,
                self.segment_flags.len()
            );
            return None;
        }
        Some(index)
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

fn turn_on_red_rule(near: bool) -> JunctionRule {
    if near {
        JunctionRule::NearTurnOnRed
    } else {
        JunctionRule::FarTurnOnRed
    }
}
