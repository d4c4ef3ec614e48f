//! Shared slot for the generation fetch handling reads from.

use std::sync::Arc;

use larder_core::Generation;
use parking_lot::RwLock;

/// The one generation currently serving requests.
///
/// Set during activation, replaced by a later activation, cleared on
/// retirement. Readers clone the handle out so the lock is never held
/// across an await.
#[derive(Clone, Default)]
pub struct ActiveSlot {
    inner: Arc<RwLock<Option<Generation>>>,
}

impl ActiveSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, generation: Generation) {
        *self.inner.write() = Some(generation);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn get(&self) -> Option<Generation> {
        self.inner.read().clone()
    }

    /// Tag of the active generation, if any.
    pub fn tag(&self) -> Option<String> {
        self.inner.read().as_ref().map(|g| g.tag().to_string())
    }
}
