//! Save records: one `SegmentNodeConf` per segment with at least one
//! override, holding an optional `SegmentNodeFlagsRecord` per end whose
//! fields are `None` where the rule follows its default.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::road_topology::{NetworkView, NodeId, SegmentId};
use crate::Saveable;

use super::flags::{JunctionRule, SegmentEndFlags};
use super::manager::JunctionRestrictionsManager;
use super::predicates::{self, RuleContext};

// =============================================================================
// Records
// =============================================================================

/// Overrides of one segment end. `None` means no override for that rule.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
pub struct SegmentNodeFlagsRecord {
    pub uturn_allowed: Option<bool>,
    pub near_turn_on_red_allowed: Option<bool>,
    pub far_turn_on_red_allowed: Option<bool>,
    pub straight_lane_changing_allowed: Option<bool>,
    pub enter_when_blocked_allowed: Option<bool>,
    pub pedestrian_crossing_allowed: Option<bool>,
}

impl SegmentNodeFlagsRecord {
    pub fn from_end_flags(flags: &SegmentEndFlags) -> Self {
        let mut record = Self::default();
        for rule in JunctionRule::ALL {
            record.set(rule, flags.get_override(rule).to_option());
        }
        record
    }

    pub fn get(&self, rule: JunctionRule) -> Option<bool> {
        match rule {
            JunctionRule::UTurn => self.uturn_allowed,
            JunctionRule::NearTurnOnRed => self.near_turn_on_red_allowed,
            JunctionRule::FarTurnOnRed => self.far_turn_on_red_allowed,
            JunctionRule::LaneChangingWhenGoingStraight => self.straight_lane_changing_allowed,
            JunctionRule::EnteringBlockedJunction => self.enter_when_blocked_allowed,
            JunctionRule::PedestrianCrossing => self.pedestrian_crossing_allowed,
        }
    }

    pub fn set(&mut self, rule: JunctionRule, value: Option<bool>) {
        let slot = match rule {
            JunctionRule::UTurn => &mut self.uturn_allowed,
            JunctionRule::NearTurnOnRed => &mut self.near_turn_on_red_allowed,
            JunctionRule::FarTurnOnRed => &mut self.far_turn_on_red_allowed,
            JunctionRule::LaneChangingWhenGoingStraight => &mut self.straight_lane_changing_allowed,
            JunctionRule::EnteringBlockedJunction => &mut self.enter_when_blocked_allowed,
            JunctionRule::PedestrianCrossing => &mut self.pedestrian_crossing_allowed,
        };
        *slot = value;
    }
}

/// Saved junction restrictions of one segment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
pub struct SegmentNodeConf {
    pub segment_id: u32,
    pub start_node_flags: Option<SegmentNodeFlagsRecord>,
    pub end_node_flags: Option<SegmentNodeFlagsRecord>,
}

impl SegmentNodeConf {
    fn end(&self, start_node: bool) -> Option<&SegmentNodeFlagsRecord> {
        if start_node {
            self.start_node_flags.as_ref()
        } else {
            self.end_node_flags.as_ref()
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Why a single record could not be saved or loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JunctionRecordError {
    SegmentOutOfRange { segment_id: u32, capacity: usize },
    UnresolvedNode { segment_id: u32, start_node: bool },
    MissingNodeSnapshot { node_id: u32 },
}

impl fmt::Display for JunctionRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentOutOfRange {
                segment_id,
                capacity,
            } => write!(
                f,
                "segment {} does not fit the flag table (capacity {})",
                segment_id, capacity
            ),
            Self::UnresolvedNode {
                segment_id,
                start_node,
            } => write!(
                f,
                "segment {} has no node at its {} end",
                segment_id,
                if *start_node { "start" } else { "end" }
            ),
            Self::MissingNodeSnapshot { node_id } => {
                write!(f, "node {} has no topology snapshot", node_id)
            }
        }
    }
}

impl std::error::Error for JunctionRecordError {}

// =============================================================================
// Save / load
// =============================================================================

impl JunctionRestrictionsManager {
    /// Collect one record per valid segment with overrides.
    ///
    /// Records that fail are logged and skipped; the returned flag is `false`
    /// if any did.
    pub fn save_data(&self, network: &dyn NetworkView) -> (Vec<SegmentNodeConf>, bool) {
        let mut records = Vec::new();
        let mut success = true;

        for index in 1..self.capacity() {
            let segment_id = SegmentId(index as u32);
            match self.save_segment(network, segment_id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "Junction restrictions: failed to save segment {}: {}",
                        segment_id.0, e
                    );
                    success = false;
                }
            }
        }

        (records, success)
    }

    fn save_segment(
        &self,
        network: &dyn NetworkView,
        segment_id: SegmentId,
    ) -> Result<Option<SegmentNodeConf>, JunctionRecordError> {
        if !network.is_segment_valid(segment_id) {
            return Ok(None);
        }

        let mut ends = [None, None];
        for (slot, start_node) in ends.iter_mut().zip([true, false]) {
            let node_id = network.segment_node(segment_id, start_node).ok_or(
                JunctionRecordError::UnresolvedNode {
                    segment_id: segment_id.0,
                    start_node,
                },
            )?;
            if !network.is_node_valid(node_id) {
                continue;
            }
            let flags = self.end_flags(segment_id, start_node);
            if !flags.is_default() {
                *slot = Some(SegmentNodeFlagsRecord::from_end_flags(&flags));
            }
        }

        let [start_node_flags, end_node_flags] = ends;
        if start_node_flags.is_none() && end_node_flags.is_none() {
            return Ok(None);
        }
        Ok(Some(SegmentNodeConf {
            segment_id: segment_id.0,
            start_node_flags,
            end_node_flags,
        }))
    }

    /// Apply saved records over the current network.
    ///
    /// Records of segments that no longer exist are skipped, and each value
    /// is only applied where its rule is configurable today. A failing record
    /// is logged and the rest still load; the return value is `false` if any
    /// record failed.
    pub fn load_data(&mut self, ctx: &RuleContext, records: &[SegmentNodeConf]) -> bool {
        info!(
            "Loading junction restrictions. {} elements",
            records.len()
        );

        let mut success = true;
        for record in records {
            if let Err(e) = self.load_record(ctx, record) {
                warn!(
                    "Junction restrictions: error loading segment {}, skipping: {}",
                    record.segment_id, e
                );
                success = false;
            }
        }
        success
    }

    fn load_record(
        &mut self,
        ctx: &RuleContext,
        record: &SegmentNodeConf,
    ) -> Result<(), JunctionRecordError> {
        let segment_id = SegmentId(record.segment_id);
        if !ctx.network.is_segment_valid(segment_id) {
            return Ok(());
        }
        if segment_id.index() >= self.capacity() {
            return Err(JunctionRecordError::SegmentOutOfRange {
                segment_id: record.segment_id,
                capacity: self.capacity(),
            });
        }

        for start_node in [true, false] {
            let Some(flags) = record.end(start_node) else {
                continue;
            };
            let node_id = ctx
                .network
                .segment_node(segment_id, start_node)
                .unwrap_or(NodeId::NONE);
            if node_id == NodeId::NONE {
                warn!(
                    "Junction restrictions: could not get {} node of segment {} while loading",
                    if start_node { "start" } else { "end" },
                    segment_id.0
                );
                continue;
            }
            let node = ctx
                .network
                .node_snapshot(node_id)
                .ok_or(JunctionRecordError::MissingNodeSnapshot { node_id: node_id.0 })?;

            for rule in JunctionRule::ALL {
                let Some(value) = flags.get(rule) else {
                    continue;
                };
                if predicates::is_configurable(ctx, rule, segment_id, start_node, &node) {
                    self.set_allowed(ctx, rule, segment_id, start_node, value);
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Saveable payload
// =============================================================================

/// Save-file view of the junction restrictions.
///
/// Kept in sync with the manager by a system; after a load the records are
/// fed back into the manager once (`needs_apply`).
#[derive(Resource, Debug, Clone, Default)]
pub struct JunctionRestrictionsSaveData {
    pub records: Vec<SegmentNodeConf>,
    pub needs_apply: bool,
    /// Outcome of the last applied load. `Some(false)` means some records
    /// were dropped and the data should be rewritten on the next save.
    pub last_load_ok: Option<bool>,
}

impl Saveable for JunctionRestrictionsSaveData {
    const SAVE_KEY: &'static str = "junction_restrictions";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        if self.records.is_empty() {
            return None;
        }
        Some(bitcode::encode(&self.records))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        let records: Vec<SegmentNodeConf> = crate::decode_or_warn(Self::SAVE_KEY, bytes);
        Self {
            records,
            needs_apply: true,
            last_load_ok: None,
        }
    }
}
