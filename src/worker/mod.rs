//! Worker Service
//!
//! A worker owns exactly one [`KvStore`] and exposes it over the binary
//! protocol. Every connection is served by its own task; the store is the only
//! state shared between them.
//!
//! | Request | Store call     | Response                     |
//! |---------|----------------|------------------------------|
//! | GET     | `get(key)`     | `OK` + value, or `NOT_FOUND` |
//! | SET     | `put(key, v)`  | `OK` (evictions stay local)  |

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::metrics::{metrics, Role};
use crate::proto::{FrameLimits, Op, Request, Response};
use crate::service::{self, ConnectionSettings, RequestHandler};
use crate::store::{KvStore, LruCache, DEFAULT_CAPACITY};

// =============================================================================
// Configuration
// =============================================================================

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Address to listen on
    pub listen_addr: String,
    /// Cache capacity in entries
    pub capacity: usize,
    /// Close connections that send nothing for this long
    pub idle_timeout: Duration,
    /// Accepted key/value sizes
    pub limits: FrameLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7101".to_string(),
            capacity: DEFAULT_CAPACITY,
            idle_timeout: Duration::from_secs(60),
            limits: FrameLimits::default(),
        }
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Cache worker serving one store
pub struct Worker<S: KvStore = LruCache> {
    config: WorkerConfig,
    store: Arc<S>,
}

impl Worker<LruCache> {
    /// Create a worker backed by an [`LruCache`] of `config.capacity` entries
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let store = LruCache::new(config.capacity)?;
        Ok(Self::with_store(config, Arc::new(store)))
    }
}

impl<S: KvStore> Worker<S> {
    /// Create a worker over an existing store
    pub fn with_store(config: WorkerConfig, store: Arc<S>) -> Self {
        Self { config, store }
    }

    /// Get the configuration
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Get the backing store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Apply one request to the store
    pub fn apply(&self, req: Request) -> Response {
        let response = match req.op {
            Op::Get => {
                let found = self.store.get(&req.key);
                metrics().record_lookup(found.is_some());
                match found {
                    Some(value) => Response::ok(value),
                    None => Response::not_found(),
                }
            }
            Op::Set => {
                if let Some(evicted) = self.store.put(req.key, req.value) {
                    metrics().record_eviction();
                    debug!(
                        key_len = evicted.key.len(),
                        value_len = evicted.value.len(),
                        "Evicted least recently used entry"
                    );
                }
                Response::ok_empty()
            }
        };

        metrics().set_cache_entries(self.store.len());
        response
    }

    fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            role: Role::Worker,
            idle_timeout: self.config.idle_timeout,
            limits: self.config.limits,
        }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| {
                Error::Config(format!(
                    "Failed to bind worker on {}: {}",
                    self.config.listen_addr, e
                ))
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            capacity = self.config.capacity,
            max_key = self.config.limits.max_key,
            max_value = self.config.limits.max_value,
            "Starting worker"
        );
        let settings = self.connection_settings();
        service::serve(listener, Arc::new(self), settings, shutdown).await
    }
}

#[async_trait]
impl<S: KvStore> RequestHandler for Worker<S> {
    async fn handle(&self, req: Request) -> Response {
        self.apply(req)
    }
}

impl<S: KvStore> std::fmt::Debug for Worker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .field("entries", &self.store.len())
            .finish()
    }
}
