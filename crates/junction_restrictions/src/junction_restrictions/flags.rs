//! Per segment-end flag state: six tri-state overrides and their computed
//! defaults.

use serde::{Deserialize, Serialize};

/// A boolean that can also be unset. `Unset` defers to the computed default.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
pub enum TernaryFlag {
    #[default]
    Unset,
    True,
    False,
}

impl TernaryFlag {
    pub fn is_set(self) -> bool {
        self != TernaryFlag::Unset
    }

    pub fn to_option(self) -> Option<bool> {
        match self {
            TernaryFlag::Unset => None,
            TernaryFlag::True => Some(true),
            TernaryFlag::False => Some(false),
        }
    }
}

impl From<bool> for TernaryFlag {
    fn from(value: bool) -> Self {
        if value {
            TernaryFlag::True
        } else {
            TernaryFlag::False
        }
    }
}

impl From<Option<bool>> for TernaryFlag {
    fn from(value: Option<bool>) -> Self {
        value.map_or(TernaryFlag::Unset, TernaryFlag::from)
    }
}

/// The six overridable junction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JunctionRule {
    UTurn,
    /// Turning on red towards the drive side (right in right-hand traffic).
    NearTurnOnRed,
    /// Turning on red across oncoming traffic.
    FarTurnOnRed,
    LaneChangingWhenGoingStraight,
    EnteringBlockedJunction,
    PedestrianCrossing,
}

impl JunctionRule {
    /// All rules in canonical evaluation order.
    pub const ALL: [JunctionRule; 6] = [
        JunctionRule::UTurn,
        JunctionRule::NearTurnOnRed,
        JunctionRule::FarTurnOnRed,
        JunctionRule::LaneChangingWhenGoingStraight,
        JunctionRule::EnteringBlockedJunction,
        JunctionRule::PedestrianCrossing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            JunctionRule::UTurn => "u-turn",
            JunctionRule::NearTurnOnRed => "near turn-on-red",
            JunctionRule::FarTurnOnRed => "far turn-on-red",
            JunctionRule::LaneChangingWhenGoingStraight => "lane changing when going straight",
            JunctionRule::EnteringBlockedJunction => "entering blocked junction",
            JunctionRule::PedestrianCrossing => "pedestrian crossing",
        }
    }

    /// Whether a change affects path legality. Entering a blocked junction
    /// is only evaluated while vehicles drive, so routing stays untouched.
    pub fn requires_recalculation(self) -> bool {
        self != JunctionRule::EnteringBlockedJunction
    }
}

/// Overrides and defaults for one directed segment end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentEndFlags {
    pub uturn: TernaryFlag,
    pub near_turn_on_red: TernaryFlag,
    pub far_turn_on_red: TernaryFlag,
    pub straight_lane_change: TernaryFlag,
    pub enter_when_blocked: TernaryFlag,
    pub pedestrian_crossing: TernaryFlag,

    pub default_uturn: bool,
    pub default_near_turn_on_red: bool,
    pub default_far_turn_on_red: bool,
    pub default_straight_lane_change: bool,
    pub default_enter_when_blocked: bool,
    pub default_pedestrian_crossing: bool,
}

impl SegmentEndFlags {
    /// No override is set. Defaults are irrelevant here.
    pub fn is_default(&self) -> bool {
        JunctionRule::ALL
            .iter()
            .all(|&rule| !self.get_override(rule).is_set())
    }

    /// Clear every override; with `clear_defaults` also zero the defaults.
    pub fn reset(&mut self, clear_defaults: bool) {
        for rule in JunctionRule::ALL {
            *self.override_mut(rule) = TernaryFlag::Unset;
            if clear_defaults {
                *self.default_mut(rule) = false;
            }
        }
    }

    pub fn get_override(&self, rule: JunctionRule) -> TernaryFlag {
        match rule {
            JunctionRule::UTurn => self.uturn,
            JunctionRule::NearTurnOnRed => self.near_turn_on_red,
            JunctionRule::FarTurnOnRed => self.far_turn_on_red,
            JunctionRule::LaneChangingWhenGoingStraight => self.straight_lane_change,
            JunctionRule::EnteringBlockedJunction => self.enter_when_blocked,
            JunctionRule::PedestrianCrossing => self.pedestrian_crossing,
        }
    }

    pub fn get_default(&self, rule: JunctionRule) -> bool {
        match rule {
            JunctionRule::UTurn => self.default_uturn,
            JunctionRule::NearTurnOnRed => self.default_near_turn_on_red,
            JunctionRule::FarTurnOnRed => self.default_far_turn_on_red,
            JunctionRule::LaneChangingWhenGoingStraight => self.default_straight_lane_change,
            JunctionRule::EnteringBlockedJunction => self.default_enter_when_blocked,
            JunctionRule::PedestrianCrossing => self.default_pedestrian_crossing,
        }
    }

    pub fn set_override(&mut self, rule: JunctionRule, value: TernaryFlag) {
        *self.override_mut(rule) = value;
    }

    pub fn set_default(&mut self, rule: JunctionRule, value: bool) {
        *self.default_mut(rule) = value;
    }

    /// Override when set, otherwise the default.
    pub fn effective(&self, rule: JunctionRule) -> TernaryFlag {
        match self.get_override(rule) {
            TernaryFlag::Unset => TernaryFlag::from(self.get_default(rule)),
            value => value,
        }
    }

    pub fn is_allowed(&self, rule: JunctionRule) -> bool {
        self.effective(rule) == TernaryFlag::True
    }

    fn override_mut(&mut self, rule: JunctionRule) -> &mut TernaryFlag {
        match rule {
            JunctionRule::UTurn => &mut self.uturn,
            JunctionRule::NearTurnOnRed => &mut self.near_turn_on_red,
            JunctionRule::FarTurnOnRed => &mut self.far_turn_on_red,
            JunctionRule::LaneChangingWhenGoingStraight => &mut self.straight_lane_change,
            JunctionRule::EnteringBlockedJunction => &mut self.enter_when_blocked,
            JunctionRule::PedestrianCrossing => &mut self.pedestrian_crossing,
        }
    }

    fn default_mut(&mut self, rule: JunctionRule) -> &mut bool {
        match rule {
            JunctionRule::UTurn => &mut self.default_uturn,
            JunctionRule::NearTurnOnRed => &mut self.default_near_turn_on_red,
            JunctionRule::FarTurnOnRed => &mut self.default_far_turn_on_red,
            JunctionRule::LaneChangingWhenGoingStraight => &mut self.default_straight_lane_change,
            JunctionRule::EnteringBlockedJunction => &mut self.default_enter_when_blocked,
            JunctionRule::PedestrianCrossing => &mut self.default_pedestrian_crossing,
        }
    }
}

/// Both ends of one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentFlags {
    pub start_node_flags: SegmentEndFlags,
    pub end_node_flags: SegmentEndFlags,
}

impl SegmentFlags {
    pub fn end(&self, start_node: bool) -> &SegmentEndFlags {
        if start_node {
            &self.start_node_flags
        } else {
            &self.end_node_flags
        }
    }

    pub fn end_mut(&mut self, start_node: bool) -> &mut SegmentEndFlags {
        if start_node {
            &mut self.start_node_flags
        } else {
            &mut self.end_node_flags
        }
    }

    pub fn is_default(&self) -> bool {
        self.start_node_flags.is_default() && self.end_node_flags.is_default()
    }

    pub fn reset(&mut self, clear_defaults: bool) {
        self.start_node_flags.reset(clear_defaults);
        self.end_node_flags.reset(clear_defaults);
    }

    pub fn reset_end(&mut self, start_node: bool, clear_defaults: bool) {
        self.end_mut(start_node).reset(clear_defaults);
    }
}
