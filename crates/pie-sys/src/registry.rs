//! Process-wide table of opaque host values handed to the guest.

use std::sync::Arc;

use parking_lot::Mutex;
use pie_value::Value;
use rustc_hash::FxHashMap;

use crate::{CallResult, HostError};

/// An opaque value the host returned to the guest.
///
/// The guest only ever holds its handle and reaches it through
/// call/apply/unapply requests.
pub trait HostObject: Send + Sync {
    fn call(&self, _args: &[Value]) -> CallResult {
        Err(HostError::Failed("value is not callable".to_string()))
    }

    fn apply(&self, _args: &[Value]) -> CallResult {
        Err(HostError::Failed("value is not indexable".to_string()))
    }

    fn unapply(&self, _args: &[Value]) -> CallResult {
        Err(HostError::Failed("value is not assignable".to_string()))
    }

    /// Called once when the entry leaves the registry.
    fn dispose(&self) {}
}

#[derive(Default)]
struct RegistryInner {
    next: u32,
    values: FxHashMap<u32, Arc<dyn HostObject>>,
}

/// Handle table for registered host values.
///
/// Handles start at 1 and are never reused. Dropping the registry (VM
/// teardown) releases every remaining value.
#[derive(Default)]
pub struct ValueRegistry {
    inner: Mutex<RegistryInner>,
}

impl ValueRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value and return its handle.
    pub fn register(&self, value: Arc<dyn HostObject>) -> u32 {
        let mut inner = self.inner.lock();
        inner.next += 1;
        let handle = inner.next;
        inner.values.insert(handle, value);
        handle
    }

    /// Register a value and wrap its handle for a guest response.
    pub fn register_value(&self, value: Arc<dyn HostObject>) -> Value {
        Value::Handle(self.register(value))
    }

    #[must_use]
    pub fn get(&self, handle: u32) -> Option<Arc<dyn HostObject>> {
        self.inner.lock().values.get(&handle).cloned()
    }

    /// Remove a handle. Unknown handles are ignored.
    ///
    /// Returns whether an entry was removed.
    pub fn dispose(&self, handle: u32) -> bool {
        let removed = self.inner.lock().values.remove(&handle);
        match removed {
            Some(value) => {
                value.dispose();
                true
            }
            None => false,
        }
    }

    /// Remove and dispose every entry.
    pub fn clear(&self) {
        let drained: Vec<_> = self.inner.lock().values.drain().map(|(_, v)| v).collect();
        for value in drained {
            value.dispose();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }
}

impl std::fmt::Debug for ValueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueRegistry")
            .field("len", &self.len())
            .finish()
    }
}
