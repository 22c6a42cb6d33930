//! Junction restriction rule engine.
//!
//! Every directed segment end carries six rules (U-turns, near and far
//! turn-on-red, lane changing while going straight, entering a blocked
//! junction, pedestrian crossings). Each rule has a default derived from the
//! node geometry and the global options, and an optional user override.
//! Overrides are only kept while the geometry still makes them meaningful;
//! when a segment disappears its overrides wait in quarantine until a
//! replacement segment end takes over its role.

mod events;
mod flags;
mod manager;
mod persistence;
mod plugin;
pub mod predicates;
mod systems;

pub use events::{
    JunctionRestrictionRejected, RoutingRecalculationRequested, SegmentBecameInvalid,
    SegmentBecameValid, SegmentChangesPublished, SegmentEndReplaced, SetJunctionRestrictionEvent,
    ToggleJunctionRestrictionEvent,
};
pub use flags::{JunctionRule, SegmentEndFlags, SegmentFlags, TernaryFlag};
pub use manager::{JunctionNotification, JunctionRestrictionsManager};
pub use persistence::{
    JunctionRecordError, JunctionRestrictionsSaveData, SegmentNodeConf, SegmentNodeFlagsRecord,
};
pub use plugin::JunctionRestrictionsPlugin;
pub use predicates::RuleContext;
pub use systems::JunctionCollaborators;
