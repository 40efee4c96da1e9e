//! Shared cache with tag invalidation and single-flight computation.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::backend::{CacheBackend, MemoryBackend};
use crate::error::CacheError;

type InFlight = Shared<BoxFuture<'static, Result<Value, CacheError>>>;

/// Process-wide cache shared by every component.
///
/// Cloning is cheap; clones share the same backend and in-flight table.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    /// Computations currently running, keyed by cache key.
    in_flight: Arc<DashMap<String, InFlight>>,
}

impl Cache {
    /// Create a cache over any backend.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Create a cache over an in-process [`MemoryBackend`].
    pub fn in_memory(max_entries: usize) -> Self {
        Self::new(Arc::new(MemoryBackend::new(max_entries)))
    }

    /// Read a live value.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.backend.get(key).await
    }

    /// Write a value with an optional TTL and invalidation tags.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> Result<(), CacheError> {
        let tags = owned_tags(tags);
        self.backend.set(key, value, ttl, &tags).await
    }

    /// Remove a single key.
    pub async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.remove(key).await
    }

    /// Remove every entry carrying `tag`.
    pub async fn invalidate(&self, tag: &str) -> Result<usize, CacheError> {
        self.backend.invalidate(tag).await
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.backend.len().await
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Return the cached value for `key`, computing it on a miss.
    ///
    /// At most one computation runs per key at a time: concurrent callers
    /// for the same missing key await the single in-flight computation.
    /// On success the value is stored with `ttl` and `tags`; on failure
    /// nothing is stored and every waiter receives the same error.
    ///
    /// If every waiter is cancelled first, the computation is dropped
    /// unfinished and the next caller starts a fresh one.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        tags: &[&str],
        compute: F,
    ) -> Result<Value, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        if let Some(value) = self.backend.get(key).await? {
            trace!("Cache hit for {}", key);
            return Ok(value);
        }

        let shared = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                debug!("Joining in-flight computation for {}", key);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let future = Self::leader_future(
                    self.backend.clone(),
                    key.to_string(),
                    ttl,
                    owned_tags(tags),
                    compute(),
                );
                slot.insert(future.clone());
                future
            }
        };

        Waiter::new(self.in_flight.clone(), key, shared).wait().await
    }

    /// Build the shared future run on behalf of every waiter for one key.
    fn leader_future<Fut, E>(
        backend: Arc<dyn CacheBackend>,
        key: String,
        ttl: Option<Duration>,
        tags: Vec<String>,
        compute: Fut,
    ) -> InFlight
    where
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        async move {
            // A previous leader may have finished between our miss and registration.
            if let Some(value) = backend.get(&key).await? {
                return Ok(value);
            }

            match compute.await {
                Ok(value) => {
                    if let Err(e) = backend.set(&key, value.clone(), ttl, &tags).await {
                        warn!("Failed to store computed value for {}: {}", key, e);
                    }
                    Ok(value)
                }
                Err(e) => {
                    debug!("Computation for {} failed: {}", key, e);
                    Err(CacheError::ComputeFailed(Arc::new(e)))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Spawn a background task that purges expired entries every `interval`.
    ///
    /// The task runs independently of any request; abort the handle on shutdown.
    pub fn spawn_janitor(&self, interval: Duration) -> JoinHandle<()> {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match backend.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!("Cache janitor purged {} expired entries", removed),
                    Err(e) => warn!("Cache janitor failed: {}", e),
                }
            }
        })
    }
}

/// One caller's interest in an in-flight computation.
///
/// `handle` is never polled and only identifies the computation. The
/// in-flight entry goes away once the computation finishes, or once the
/// last waiter is dropped without seeing it finish.
struct Waiter {
    in_flight: Arc<DashMap<String, InFlight>>,
    key: String,
    handle: InFlight,
    polled: Option<InFlight>,
    finished: bool,
}

impl Waiter {
    fn new(in_flight: Arc<DashMap<String, InFlight>>, key: &str, handle: InFlight) -> Self {
        Self {
            in_flight,
            key: key.to_string(),
            handle,
            polled: None,
            finished: false,
        }
    }

    async fn wait(mut self) -> Result<Value, CacheError> {
        let polled = self.polled.get_or_insert_with(|| self.handle.clone());
        let result = polled.await;
        self.finished = true;
        result
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        // Release our polled handle first so it is not counted below.
        self.polled.take();
        let finished = self.finished;
        let removed = self.in_flight.remove_if(&self.key, |_, running| {
            // The map and `handle` hold the last two references when no
            // other waiter remains.
            running.ptr_eq(&self.handle) && (finished || running.strong_count() == Some(2))
        });
        if removed.is_some() && !finished {
            debug!("Abandoned computation for {} dropped", self.key);
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

fn owned_tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}
