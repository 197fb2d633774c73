//! Per-connection operation registry.
//!
//! Tracks which operation ids are active on a WebSocket connection and
//! owns their runner handles. An id stays registered until its runner
//! reports that it finished, including while a `stop` is being honoured,
//! so a reused id can never overlap with its predecessor.

use std::collections::HashMap;

use super::operation::{CancelReason, OperationHandle};

/// Active operations of a single connection, keyed by client id.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, OperationHandle>,
}

impl OperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` has an active operation.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    /// Registers a runner handle.
    ///
    /// Returns the handle back if its id is already active; the existing
    /// operation is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the rejected handle when the id is taken.
    pub fn insert(&mut self, handle: OperationHandle) -> Result<(), OperationHandle> {
        if self.operations.contains_key(handle.id()) {
            return Err(handle);
        }
        self.operations.insert(handle.id().to_string(), handle);
        Ok(())
    }

    /// Cancels `id` on behalf of a client `stop`.
    ///
    /// Returns `false` if `id` is unknown or already stopping.
    pub fn stop(&mut self, id: &str) -> bool {
        self.operations
            .get_mut(id)
            .is_some_and(|handle| handle.cancel(CancelReason::Stop))
    }

    /// Forgets `id` after its runner finished.
    pub fn finished(&mut self, id: &str) -> Option<OperationHandle> {
        self.operations.remove(id)
    }

    /// Cancels every operation and empties the registry.
    pub fn cancel_all(&mut self, reason: CancelReason) -> Vec<OperationHandle> {
        self.operations
            .drain()
            .map(|(_, mut handle)| {
                handle.cancel(reason);
                handle
            })
            .collect()
    }

    /// Returns the number of active operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if no operation is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the handle for `id`, if active.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&OperationHandle> {
        self.operations.get(id)
    }
}
