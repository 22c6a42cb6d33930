use bevy::prelude::*;
use std::collections::BTreeMap;

pub mod config;
pub mod junction_restrictions;
pub mod lane_connections;
pub mod road_topology;
pub mod saveable_keys;

pub use junction_restrictions::JunctionRestrictionsPlugin;

// ---------------------------------------------------------------------------
// Save integration
// ---------------------------------------------------------------------------

/// A resource persisted under its own key in the host's save file.
///
/// The save container lives outside this crate and only ever sees the
/// `SAVE_KEY -> bytes` map built by [`SaveableRegistry::save_all`].
pub trait Saveable: Resource + Default + Send + Sync + 'static {
    /// Key in the extension map. Never rename it once saves exist.
    const SAVE_KEY: &'static str;

    /// `None` skips the key, e.g. while nothing differs from the defaults.
    fn save_to_bytes(&self) -> Option<Vec<u8>>;

    fn load_from_bytes(bytes: &[u8]) -> Self;
}

/// `bitcode::decode` that logs and falls back to `T::default()` on bad bytes.
pub fn decode_or_warn<T: bitcode::DecodeOwned + Default>(key: &str, bytes: &[u8]) -> T {
    bitcode::decode(bytes).unwrap_or_else(|e| {
        warn!(
            "Saveable {}: {} bytes did not decode ({}), using defaults",
            key,
            bytes.len(),
            e
        );
        T::default()
    })
}

pub type SaveFn = Box<dyn Fn(&World) -> Option<Vec<u8>> + Send + Sync>;
pub type LoadFn = Box<dyn Fn(&mut World, &[u8]) + Send + Sync>;

pub struct SaveableEntry {
    pub key: String,
    pub save_fn: SaveFn,
    pub load_fn: LoadFn,
}

/// Every `Saveable` resource of the crate, filled in by the plugin.
#[derive(Resource, Default)]
pub struct SaveableRegistry {
    pub entries: Vec<SaveableEntry>,
}

impl SaveableRegistry {
    /// A second registration of the same key is ignored with a warning (and
    /// trips a debug assertion).
    pub fn register<T: Saveable>(&mut self) {
        if self.entries.iter().any(|e| e.key == T::SAVE_KEY) {
            warn!(
                "SaveableRegistry: key '{}' registered twice, keeping the first",
                T::SAVE_KEY
            );
            debug_assert!(false, "SaveableRegistry: duplicate key '{}'", T::SAVE_KEY);
            return;
        }
        self.entries.push(SaveableEntry {
            key: T::SAVE_KEY.to_string(),
            save_fn: Box::new(|world: &World| world.get_resource::<T>()?.save_to_bytes()),
            load_fn: Box::new(|world: &mut World, bytes: &[u8]| {
                world.insert_resource(T::load_from_bytes(bytes));
            }),
        });
    }

    pub fn save_all(&self, world: &World) -> BTreeMap<String, Vec<u8>> {
        self.entries
            .iter()
            .filter_map(|entry| Some((entry.key.clone(), (entry.save_fn)(world)?)))
            .collect()
    }

    /// Keys missing from `extensions` leave their resource untouched.
    pub fn load_all(&self, world: &mut World, extensions: &BTreeMap<String, Vec<u8>>) {
        for entry in &self.entries {
            if let Some(bytes) = extensions.get(&entry.key) {
                (entry.load_fn)(world, bytes);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// System ordering
// ---------------------------------------------------------------------------

/// Ordered phases for junction restriction systems in the `Update` schedule.
///
/// Configured as a chain: `Topology` → `Requests` → `Notify`, so that
/// defaults are recomputed against the current network before any user
/// request is applied, and downstream listeners only ever observe the state
/// after both have run.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum JunctionSet {
    /// Segment validity changes, segment-end replacements, post-load apply.
    Topology,
    /// Set/toggle requests coming from tools.
    Requests,
    /// Routing recalculation and change publication, save data sync.
    Notify,
}
