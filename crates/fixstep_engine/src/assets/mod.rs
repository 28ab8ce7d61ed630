//! Asset handle resolution
//!
//! The core never decodes asset bytes. An external asset subsystem loads
//! images, sounds and map data however it likes and hands back opaque
//! handles; components keep those handles and pass them to draw commands.

use std::collections::HashMap;
use thiserror::Error;

use crate::foundation::collections::TypedHandle;

/// Asset handle type
pub type AssetHandle<T> = TypedHandle<T>;

/// Category of an externally managed asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Sprites, textures, spritesheets
    Image,
    /// Sound effects and music
    Sound,
    /// Tilemaps and other level data
    Map,
}

/// Marker trait tying a handle type to its [`AssetKind`]
pub trait AssetType: 'static {
    /// Kind resolved for this marker
    const KIND: AssetKind;
}

/// Image asset marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Image {}

/// Sound asset marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {}

/// Map data marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapData {}

impl AssetType for Image {
    const KIND: AssetKind = AssetKind::Image;
}

impl AssetType for Sound {
    const KIND: AssetKind = AssetKind::Sound;
}

impl AssetType for MapData {
    const KIND: AssetKind = AssetKind::Map;
}

/// Asset resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// No asset of that kind is known under the given name
    #[error("No {kind:?} asset named '{name}'")]
    Unresolved {
        /// Requested kind
        kind: AssetKind,
        /// Requested name
        name: String,
    },
}

/// Narrow interface to the external asset subsystem
pub trait AssetResolver: Send {
    /// Resolve a name to a raw handle id of the given kind
    fn resolve_raw(&self, kind: AssetKind, name: &str) -> Option<u64>;
}

impl dyn AssetResolver + '_ {
    /// Resolve a typed handle
    pub fn resolve<T: AssetType>(&self, name: &str) -> Option<AssetHandle<T>> {
        self.resolve_raw(T::KIND, name).map(AssetHandle::new)
    }

    /// Resolve a typed handle, failing with [`AssetError::Unresolved`]
    pub fn require<T: AssetType>(&self, name: &str) -> Result<AssetHandle<T>, AssetError> {
        self.resolve::<T>(name).ok_or_else(|| AssetError::Unresolved {
            kind: T::KIND,
            name: name.to_string(),
        })
    }
}

/// In-memory name-to-handle table
///
/// Useful for headless runs and tests, and as the registry an asset loader
/// fills once its (asynchronous) loads complete.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    next_id: u64,
    by_name: HashMap<(AssetKind, String), u64>,
}

impl AssetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name, returning its handle; registering twice returns the same handle
    pub fn register<T: AssetType>(&mut self, name: &str) -> AssetHandle<T> {
        let next_id = &mut self.next_id;
        let id = *self
            .by_name
            .entry((T::KIND, name.to_string()))
            .or_insert_with(|| {
                *next_id += 1;
                *next_id
            });
        AssetHandle::new(id)
    }

    /// Number of registered assets
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl AssetResolver for AssetRegistry {
    fn resolve_raw(&self, kind: AssetKind, name: &str) -> Option<u64> {
        self.by_name.get(&(kind, name.to_string())).copied()
    }
}
