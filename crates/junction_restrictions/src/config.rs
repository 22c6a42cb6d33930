//! Capacity constants and the global junction rule options.
//!
//! The flag tables are fixed-size arenas: they are allocated once with
//! [`MAX_SEGMENT_COUNT`] slots (or an explicit capacity) and never grow.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Default number of segment slots in the flag tables. Slot 0 is reserved.
pub const MAX_SEGMENT_COUNT: usize = 36864;
/// Default number of node slots in the road topology. Slot 0 is reserved.
pub const MAX_NODE_COUNT: usize = 32768;

/// Global options consumed read-only by the default predicates.
///
/// Every `allow_*` toggle only changes the *default* of a configurable rule;
/// user overrides always win.
#[derive(
    Resource,
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
#[serde(default)]
pub struct JunctionRestrictionsConfig {
    pub allow_u_turns: bool,
    pub allow_near_turn_on_red: bool,
    pub allow_far_turn_on_red: bool,
    pub allow_lane_changes_while_going_straight: bool,
    pub allow_enter_blocked_junctions: bool,
    /// Traffic drives on the left. Flips which neighbour is "near" for
    /// turn-on-red.
    pub left_hand_drive: bool,
    /// Gate for publishing segment changes to external listeners after a
    /// routing-relevant flag change.
    pub may_publish_segment_changes: bool,
}

impl Default for JunctionRestrictionsConfig {
    fn default() -> Self {
        Self {
            allow_u_turns: false,
            allow_near_turn_on_red: false,
            allow_far_turn_on_red: false,
            allow_lane_changes_while_going_straight: false,
            allow_enter_blocked_junctions: false,
            left_hand_drive: false,
            may_publish_segment_changes: true,
        }
    }
}

impl JunctionRestrictionsConfig {
    /// Parse options from a JSON document. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether near/far turn-on-red is allowed by default for the given side.
    pub fn allow_turn_on_red(&self, near: bool) -> bool {
        if near {
            self.allow_near_turn_on_red
        } else {
            self.allow_far_turn_on_red
        }
    }
}

impl crate::Saveable for JunctionRestrictionsConfig {
    const SAVE_KEY: &'static str = "junction_restrictions_config";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        // Always saved: a city built with custom options must reload with them.
        Some(bitcode::encode(self))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        crate::decode_or_warn(Self::SAVE_KEY, bytes)
    }
}
