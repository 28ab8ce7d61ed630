//! Specialized collection types

pub use slotmap::{new_key_type, DefaultKey, Key, SlotMap};

/// Typed handle for type-safe references to externally owned resources
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TypedHandle<T> {
    id: u64,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> TypedHandle<T> {
    /// Create a new typed handle from a raw id
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Get the underlying id
    pub const fn id(&self) -> u64 {
        self.id
    }
}

// Manual impls so `T` itself does not need to be Clone/Copy
impl<T> Clone for TypedHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedHandle<T> {}
