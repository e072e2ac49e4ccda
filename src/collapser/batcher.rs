//! Time-window request collapser.
//!
//! # Responsibilities
//! - Queue single-key requests into the current window
//! - Flush the window on its timer or when it reaches `max_batch_size`
//! - Issue exactly one `load` per flushed snapshot
//! - Route each result back to its waiting caller (by id or position)
//!
//! # Design Decisions
//! - The pending set is a `Vec` behind a std mutex, held only to push or take
//! - Every window has a generation; a timer only flushes the window that armed it
//! - Requests arriving after a snapshot start a new window, never join a flushed one
//! - Callers always get a value: unanswered keys and expired waits use the loader fallback

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use crate::collapser::types::{BatchLoader, BatchRequest};
use crate::config::{CollapserConfig, MatchBy};
use crate::observability::metrics;

struct Pending<K, V> {
    generation: u64,
    requests: Vec<BatchRequest<K, V>>,
}

impl<K, V> Pending<K, V> {
    /// Snapshot-and-clear; closes the current window.
    fn take(&mut self) -> Vec<BatchRequest<K, V>> {
        self.generation = self.generation.wrapping_add(1);
        std::mem::take(&mut self.requests)
    }
}

struct Shared<L: BatchLoader> {
    name: String,
    loader: L,
    window: Duration,
    max_batch_size: usize,
    request_timeout: Duration,
    match_by: MatchBy,
    pending: Mutex<Pending<L::Key, L::Value>>,
}

/// Collapses concurrent single-key requests into batched loads.
pub struct Collapser<L: BatchLoader> {
    shared: Arc<Shared<L>>,
}

impl<L: BatchLoader> Clone for Collapser<L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: BatchLoader> Collapser<L> {
    pub fn new(name: impl Into<String>, loader: L, config: &CollapserConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                loader,
                window: Duration::from_millis(config.timer_delay_ms),
                max_batch_size: config.max_batch_size.max(1),
                request_timeout: Duration::from_millis(config.request_timeout_ms),
                match_by: config.match_by,
                pending: Mutex::new(Pending {
                    generation: 0,
                    requests: Vec::new(),
                }),
            }),
        }
    }

    #[cfg(test)]
    fn loader(&self) -> &L {
        &self.shared.loader
    }

    /// Requests waiting in the current window.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.shared.lock().requests.len()
    }

    /// Queue `key` and wait for its batched result.
    pub async fn request(&self, key: L::Key) -> L::Value {
        let (request, rx) = BatchRequest::new(key.clone());
        self.enqueue(request);

        match tokio::time::timeout(self.shared.request_timeout, rx).await {
            Ok(Ok(value)) => value,
            Ok(Err(_)) => {
                tracing::warn!(collapser = %self.shared.name, key = ?key, "Batch dropped request, serving fallback");
                self.shared.loader.fallback(&key)
            }
            Err(_) => {
                tracing::warn!(
                    collapser = %self.shared.name,
                    key = ?key,
                    timeout = ?self.shared.request_timeout,
                    "Timed out waiting for batch, serving fallback"
                );
                self.shared.loader.fallback(&key)
            }
        }
    }

    fn enqueue(&self, request: BatchRequest<L::Key, L::Value>) {
        let mut pending = self.shared.lock();
        pending.requests.push(request);

        if pending.requests.len() == 1 {
            let generation = pending.generation;
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                tokio::time::sleep(shared.window).await;
                let batch = {
                    let mut pending = shared.lock();
                    if pending.generation != generation || pending.requests.is_empty() {
                        return;
                    }
                    pending.take()
                };
                shared.dispatch(batch, "timer").await;
            });
        }

        if pending.requests.len() >= self.shared.max_batch_size {
            let batch = pending.take();
            drop(pending);
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { shared.dispatch(batch, "max_batch_size").await });
        }
    }
}

impl<L: BatchLoader> Shared<L> {
    fn lock(&self) -> MutexGuard<'_, Pending<L::Key, L::Value>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn dispatch(&self, batch: Vec<BatchRequest<L::Key, L::Value>>, trigger: &'static str) {
        let batch_id = Uuid::new_v4();

        let mut seen = HashSet::with_capacity(batch.len());
        let keys: Vec<L::Key> = batch
            .iter()
            .filter(|r| seen.insert(r.key.clone()))
            .map(|r| r.key.clone())
            .collect();
        let window_age = batch
            .iter()
            .map(|r| r.arrival.elapsed())
            .max()
            .unwrap_or_default();

        metrics::record_batch(&self.name, batch.len());
        tracing::debug!(
            collapser = %self.name,
            batch_id = %batch_id,
            trigger = trigger,
            requests = batch.len(),
            keys = keys.len(),
            window_age_ms = window_age.as_millis() as u64,
            "Flushing batch"
        );

        let values = self.loader.load(keys.clone()).await;
        let mut resolved: HashMap<L::Key, L::Value> = match self.match_by {
            MatchBy::Id => values
                .into_iter()
                .map(|v| (self.loader.key_of(&v), v))
                .collect(),
            MatchBy::Position => keys.into_iter().zip(values).collect(),
        };

        let mut missing = 0usize;
        let mut abandoned = 0usize;
        for request in batch {
            let value = match resolved.get(&request.key) {
                Some(value) => value.clone(),
                None => {
                    missing += 1;
                    let value = self.loader.fallback(&request.key);
                    resolved.insert(request.key.clone(), value.clone());
                    value
                }
            };
            if !request.resolve(value) {
                abandoned += 1;
            }
        }

        if missing > 0 {
            tracing::warn!(
                collapser = %self.name,
                batch_id = %batch_id,
                missing = missing,
                "Batch response lacked keys, served fallback for them"
            );
        }
        if abandoned > 0 {
            tracing::debug!(collapser = %self.name, batch_id = %batch_id, abandoned = abandoned, "Callers left before delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    #[derive(Default)]
    struct RecordingLoader {
        calls: Mutex<Vec<Vec<u64>>>,
        reverse: bool,
        drop_key: Option<u64>,
        delay: Duration,
    }

    impl RecordingLoader {
        fn calls(&self) -> Vec<Vec<u64>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BatchLoader for RecordingLoader {
        type Key = u64;
        type Value = (u64, String);

        fn load(&self, keys: Vec<u64>) -> impl Future<Output = Vec<(u64, String)>> + Send {
            self.calls.lock().unwrap().push(keys.clone());
            let mut values: Vec<_> = keys
                .into_iter()
                .filter(|k| Some(*k) != self.drop_key)
                .map(|k| (k, format!("user-{k}")))
                .collect();
            if self.reverse {
                values.reverse();
            }
            let delay = self.delay;
            async move {
                tokio::time::sleep(delay).await;
                values
            }
        }

        fn key_of(&self, value: &(u64, String)) -> u64 {
            value.0
        }

        fn fallback(&self, key: &u64) -> (u64, String) {
            (*key, "fallback".to_string())
        }
    }

    fn config(max_batch_size: usize) -> CollapserConfig {
        CollapserConfig {
            enabled: true,
            timer_delay_ms: 100,
            max_batch_size,
            request_timeout_ms: 1000,
            match_by: MatchBy::Id,
        }
    }

    async fn after(delay_ms: u64, collapser: &Collapser<RecordingLoader>, key: u64) -> (u64, String) {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        collapser.request(key).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_in_window_share_one_load() {
        let collapser = Collapser::new("users", RecordingLoader::default(), &config(100));

        let (a, b, c) = tokio::join!(
            after(0, &collapser, 1),
            after(20, &collapser, 2),
            after(50, &collapser, 3),
        );

        assert_eq!(collapser.loader().calls(), vec![vec![1, 2, 3]]);
        assert_eq!(a, (1, "user-1".to_string()));
        assert_eq!(b, (2, "user-2".to_string()));
        assert_eq!(c, (3, "user-3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_request_starts_new_window() {
        let collapser = Collapser::new("users", RecordingLoader::default(), &config(100));

        let (a, b) = tokio::join!(after(0, &collapser, 1), after(150, &collapser, 2));

        assert_eq!(collapser.loader().calls(), vec![vec![1], vec![2]]);
        assert_eq!(a.0, 1);
        assert_eq!(b.0, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_batch_size_flushes_early() {
        let collapser = Collapser::new("users", RecordingLoader::default(), &config(2));

        let (a, b, c) = tokio::join!(
            after(0, &collapser, 1),
            after(1, &collapser, 2),
            after(2, &collapser, 3),
        );

        assert_eq!(collapser.loader().calls(), vec![vec![1, 2], vec![3]]);
        assert_eq!((a.0, b.0, c.0), (1, 2, 3));
        assert_eq!(collapser.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_flush_next_window() {
        let collapser = Collapser::new("users", RecordingLoader::default(), &config(2));

        // 1 and 2 fill the first window at once; its timer still fires at 100ms.
        let (a, b, c, d) = tokio::join!(
            after(0, &collapser, 1),
            after(0, &collapser, 2),
            after(50, &collapser, 3),
            after(120, &collapser, 4),
        );

        assert_eq!(collapser.loader().calls(), vec![vec![1, 2], vec![3, 4]]);
        assert_eq!((a.0, b.0, c.0, d.0), (1, 2, 3, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_matches_by_id_when_upstream_reorders() {
        let loader = RecordingLoader {
            reverse: true,
            ..Default::default()
        };
        let collapser = Collapser::new("users", loader, &config(100));

        let (a, b, c) = tokio::join!(
            collapser.request(1),
            collapser.request(2),
            collapser.request(3),
        );

        assert_eq!(a.1, "user-1");
        assert_eq!(b.1, "user-2");
        assert_eq!(c.1, "user-3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_matching_trusts_order() {
        let loader = RecordingLoader {
            reverse: true,
            ..Default::default()
        };
        let mut cfg = config(100);
        cfg.match_by = MatchBy::Position;
        let collapser = Collapser::new("users", loader, &cfg);

        let (a, b) = tokio::join!(collapser.request(1), collapser.request(2));

        // Reversed upstream order is taken at face value.
        assert_eq!(a.1, "user-2");
        assert_eq!(b.1, "user-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_gets_fallback() {
        let loader = RecordingLoader {
            drop_key: Some(2),
            ..Default::default()
        };
        let collapser = Collapser::new("users", loader, &config(100));

        let (a, b) = tokio::join!(collapser.request(1), collapser.request(2));

        assert_eq!(a.1, "user-1");
        assert_eq!(b, (2, "fallback".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_keys_loaded_once() {
        let collapser = Collapser::new("users", RecordingLoader::default(), &config(100));

        let (a, b) = tokio::join!(collapser.request(7), collapser.request(7));

        assert_eq!(collapser.loader().calls(), vec![vec![7]]);
        assert_eq!(a, b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_bounded() {
        let loader = RecordingLoader {
            delay: Duration::from_secs(60),
            ..Default::default()
        };
        let collapser = Collapser::new("users", loader, &config(100));

        let value = collapser.request(4).await;
        assert_eq!(value, (4, "fallback".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_enqueue_from_tasks() {
        let collapser = Collapser::new("users", RecordingLoader::default(), &config(100));

        let handles: Vec<_> = (1..=20u64)
            .map(|k| {
                let collapser = collapser.clone();
                tokio::spawn(async move { collapser.request(k).await })
            })
            .collect();

        for (k, handle) in (1..=20u64).zip(handles) {
            assert_eq!(handle.await.unwrap().0, k);
        }

        let calls = collapser.loader().calls();
        let total: usize = calls.iter().map(Vec::len).sum();
        assert_eq!(total, 20, "every request serviced exactly once");
    }
}
