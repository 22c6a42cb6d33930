use bevy::prelude::*;
use std::collections::BTreeSet;

use crate::SaveableRegistry;

/// Save keys of every `Saveable` in this crate. Adding a `Saveable` means
/// adding its key here; `validate_saveable_registry` catches the plugin
/// that forgets to register it.
pub const EXPECTED_SAVEABLE_KEYS: &[&str] = &["junction_restrictions", "junction_restrictions_config"];

/// `PostStartup` check of the registry against [`EXPECTED_SAVEABLE_KEYS`].
/// Panics on a duplicated or a missing key.
pub fn validate_saveable_registry(registry: Res<SaveableRegistry>) {
    let mut registered = BTreeSet::new();
    for entry in &registry.entries {
        if !registered.insert(entry.key.as_str()) {
            panic!("SaveableRegistry: duplicate key '{}'", entry.key);
        }
    }

    let missing: Vec<&str> = EXPECTED_SAVEABLE_KEYS
        .iter()
        .copied()
        .filter(|key| !registered.contains(key))
        .collect();
    if !missing.is_empty() {
        panic!("SaveableRegistry drift detected, not registered: {:?}", missing);
    }
    info!("SaveableRegistry validated: {} keys", registered.len());
}
