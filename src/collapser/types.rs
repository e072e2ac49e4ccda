//! Collapser request and loader definitions.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use tokio::sync::oneshot;
use tokio::time::Instant;

/// The batched operation behind a collapser.
///
/// `load` must not fail: run it through a protected command whose fallback
/// yields `fallback(key)` for every key.
pub trait BatchLoader: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    type Value: Clone + Send + 'static;

    /// Fetch all `keys` in one upstream call.
    fn load(&self, keys: Vec<Self::Key>) -> impl Future<Output = Vec<Self::Value>> + Send;

    /// Key a returned value answers (used when matching by id).
    fn key_of(&self, value: &Self::Value) -> Self::Key;

    /// Value for a key the batch could not answer.
    fn fallback(&self, key: &Self::Key) -> Self::Value;
}

/// One caller waiting in the current window.
#[derive(Debug)]
pub struct BatchRequest<K, V> {
    pub key: K,
    pub arrival: Instant,
    pub(crate) slot: oneshot::Sender<V>,
}

impl<K, V> BatchRequest<K, V> {
    pub(crate) fn new(key: K) -> (Self, oneshot::Receiver<V>) {
        let (slot, rx) = oneshot::channel();
        let request = Self {
            key,
            arrival: Instant::now(),
            slot,
        };
        (request, rx)
    }

    /// Deliver the result. The caller may have given up already, which is fine.
    pub(crate) fn resolve(self, value: V) -> bool {
        self.slot.send(value).is_ok()
    }
}
