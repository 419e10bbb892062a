//! Orchestrator Service
//!
//! Stateless routing tier in front of the workers. For every client request
//! it asks the partitioner for the key's owners and forwards the request:
//!
//! ```text
//!                    ┌────────────────────┐
//!   client ─────────▶│    Orchestrator    │
//!                    │  owners_for(key)   │
//!                    └─────────┬──────────┘
//!              GET: primary,   │   SET: both replicas
//!              then secondary  │   concurrently
//!                 ┌────────────┴───────────┐
//!                 ▼                        ▼
//!          ┌────────────┐           ┌────────────┐
//!          │  primary   │           │ secondary  │
//!          └────────────┘           └────────────┘
//! ```
//!
//! - **GET** returns the primary's `OK`/`NOT_FOUND` as is. Any other outcome
//!   (dial failure, timeout, bad frame, `ERROR`) falls back to the secondary,
//!   whose answer is returned verbatim.
//! - **SET** is `OK` only when both replicas answer `OK`. When exactly one
//!   succeeds the replicas diverge; nothing is rolled back or repaired.
//!
//! All worker calls made for one client request share a single deadline.

mod transport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::metrics::{metrics, Role};
use crate::partition::{build_partitioner, Owners, PartitionStrategy, Partitioner, DEFAULT_VNODES};
use crate::proto::{FrameLimits, Op, Request, Response, Status};
use crate::service::{self, ConnectionSettings, RequestHandler};

pub use transport::{TcpWorkerTransport, WorkerCallError, WorkerTransport};

// =============================================================================
// Configuration
// =============================================================================

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Address to listen on
    pub listen_addr: String,
    /// Initial worker addresses (at least two distinct)
    pub workers: Vec<String>,
    /// Budget for one client request, shared by all its worker calls
    pub request_timeout: Duration,
    /// Close client connections that send nothing for this long
    pub idle_timeout: Duration,
    /// Accepted key/value sizes
    pub limits: FrameLimits,
    pub strategy: PartitionStrategy,
    /// Ring points per worker (consistent-ring only, 0 = default)
    pub vnodes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7000".to_string(),
            workers: vec!["127.0.0.1:7101".to_string(), "127.0.0.1:7102".to_string()],
            request_timeout: Duration::from_millis(300),
            idle_timeout: Duration::from_secs(60),
            limits: FrameLimits::default(),
            strategy: PartitionStrategy::default(),
            vnodes: DEFAULT_VNODES,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Request router over a set of workers
pub struct Orchestrator<T: WorkerTransport = TcpWorkerTransport> {
    config: OrchestratorConfig,
    partitioner: Arc<dyn Partitioner>,
    transport: T,
}

impl Orchestrator<TcpWorkerTransport> {
    /// Create an orchestrator reaching workers over TCP.
    ///
    /// Fails when `config.workers` holds fewer than two distinct addresses.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let transport = TcpWorkerTransport::new(config.limits.max_value);
        Self::with_transport(config, transport)
    }
}

impl<T: WorkerTransport> Orchestrator<T> {
    /// Create an orchestrator with a custom transport
    pub fn with_transport(config: OrchestratorConfig, transport: T) -> Result<Self> {
        let partitioner = build_partitioner(config.strategy, &config.workers, config.vnodes)?;
        info!(
            strategy = partitioner.name(),
            workers = ?partitioner.members(),
            "Partitioner ready"
        );

        Ok(Self {
            config,
            partitioner,
            transport,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Current workers, sorted
    pub fn members(&self) -> Vec<String> {
        self.partitioner.members()
    }

    /// Register a worker with this orchestrator
    pub fn add_worker(&self, addr: &str) {
        self.partitioner.add(addr);
        info!(worker = addr, members = ?self.partitioner.members(), "Worker added");
    }

    /// Deregister a worker from this orchestrator
    pub fn remove_worker(&self, addr: &str) {
        self.partitioner.remove(addr);
        info!(worker = addr, members = ?self.partitioner.members(), "Worker removed");
    }

    /// Owners of `key` under the current membership
    pub fn owners_for(&self, key: &[u8]) -> Option<Owners> {
        self.partitioner.owners_for(key)
    }

    /// Route one client request to its owners and combine the results
    #[instrument(skip(self, req), fields(op = %req.op, key_len = req.key.len()))]
    pub async fn route(&self, req: Request) -> Response {
        let Some(owners) = self.partitioner.owners_for(&req.key) else {
            warn!("No workers registered");
            return Response::error();
        };
        let deadline = Instant::now() + self.config.request_timeout;

        match req.op {
            Op::Get => self.route_get(req, &owners, deadline).await,
            Op::Set => self.route_set(req, &owners, deadline).await,
        }
    }

    async fn route_get(&self, req: Request, owners: &Owners, deadline: Instant) -> Response {
        match self.call_worker(&owners.primary, req.clone(), deadline).await {
            Ok(response) => return response,
            Err(e) => {
                warn!(
                    primary = %owners.primary,
                    secondary = %owners.secondary,
                    "GET on primary failed, falling back: {}", e
                );
            }
        }

        match self.call_worker(&owners.secondary, req, deadline).await {
            Ok(response) => response,
            Err(e) => {
                warn!(secondary = %owners.secondary, "GET on secondary failed: {}", e);
                Response::error()
            }
        }
    }

    async fn route_set(&self, req: Request, owners: &Owners, deadline: Instant) -> Response {
        let (primary, secondary) = tokio::join!(
            self.call_worker(&owners.primary, req.clone(), deadline),
            self.call_worker(&owners.secondary, req, deadline),
        );

        let primary_ok = matches!(&primary, Ok(res) if res.is_ok());
        let secondary_ok = matches!(&secondary, Ok(res) if res.is_ok());

        match (primary_ok, secondary_ok) {
            (true, true) => Response::ok_empty(),
            (false, false) => {
                warn!(
                    primary = %owners.primary,
                    secondary = %owners.secondary,
                    "SET failed on both replicas"
                );
                Response::error()
            }
            _ => {
                metrics().record_replica_divergence();
                warn!(
                    primary = %owners.primary,
                    primary_ok,
                    secondary = %owners.secondary,
                    secondary_ok,
                    "SET acknowledged by one replica only, replicas diverge"
                );
                Response::error()
            }
        }
    }

    /// Call one worker, bounded by `deadline`.
    ///
    /// `Ok` carries `OK` or `NOT_FOUND`; an `ERROR` status becomes
    /// [`WorkerCallError::Remote`].
    async fn call_worker(
        &self,
        addr: &str,
        req: Request,
        deadline: Instant,
    ) -> std::result::Result<Response, WorkerCallError> {
        let result = if Instant::now() >= deadline {
            Err(WorkerCallError::Timeout)
        } else {
            match timeout_at(deadline, self.transport.call(addr, req)).await {
                Ok(result) => result,
                Err(_) => Err(WorkerCallError::Timeout),
            }
        };

        let result = result.and_then(|res| match res.status {
            Status::Error => Err(WorkerCallError::Remote(res.status)),
            Status::Ok | Status::NotFound => Ok(res),
        });

        match &result {
            Ok(res) => debug!(worker = addr, status = %res.status, "Worker call complete"),
            Err(e) => metrics().record_worker_call_failure(e.reason()),
        }
        result
    }

    fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            role: Role::Orchestrator,
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
                    "Failed to bind orchestrator on {}: {}",
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
            strategy = self.partitioner.name(),
            request_timeout_ms = self.config.request_timeout.as_millis() as u64,
            "Starting orchestrator"
        );
        let settings = self.connection_settings();
        service::serve(listener, Arc::new(self), settings, shutdown).await
    }
}

#[async_trait]
impl<T: WorkerTransport> RequestHandler for Orchestrator<T> {
    async fn handle(&self, req: Request) -> Response {
        self.route(req).await
    }
}

impl<T: WorkerTransport> std::fmt::Debug for Orchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("strategy", &self.partitioner.name())
            .field("members", &self.partitioner.members())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Scripted behaviour of one fake worker
    #[derive(Clone)]
    enum Behavior {
        Reply(Response),
        Refuse,
        Hang,
    }

    #[derive(Default)]
    struct MockTransport {
        behaviors: Mutex<HashMap<String, Behavior>>,
        calls: Mutex<Vec<(String, Op)>>,
    }

    impl MockTransport {
        fn with(self, addr: &str, behavior: Behavior) -> Self {
            self.behaviors.lock().insert(addr.to_string(), behavior);
            self
        }

        fn calls_to(&self, addr: &str) -> usize {
            self.calls.lock().iter().filter(|(a, _)| a == addr).count()
        }
    }

    #[async_trait]
    impl WorkerTransport for MockTransport {
        async fn call(
            &self,
            addr: &str,
            req: Request,
        ) -> std::result::Result<Response, WorkerCallError> {
            self.calls.lock().push((addr.to_string(), req.op));
            let behavior = self.behaviors.lock().get(addr).cloned();

            match behavior {
                Some(Behavior::Reply(res)) => Ok(res),
                Some(Behavior::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Response::ok_empty())
                }
                Some(Behavior::Refuse) | None => Err(WorkerCallError::Connect(
                    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                )),
            }
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            workers: vec!["w1".to_string(), "w2".to_string()],
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        }
    }

    /// Orchestrator plus the primary/secondary of key "k"
    fn setup(
        primary: Behavior,
        secondary: Behavior,
    ) -> (Orchestrator<MockTransport>, String, String) {
        let probe = Orchestrator::with_transport(config(), MockTransport::default()).unwrap();
        let owners = probe.owners_for(b"k").unwrap();

        let transport = MockTransport::default()
            .with(&owners.primary, primary)
            .with(&owners.secondary, secondary);
        let orchestrator = Orchestrator::with_transport(config(), transport).unwrap();
        (orchestrator, owners.primary, owners.secondary)
    }

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:7000");
        assert_eq!(config.workers, vec!["127.0.0.1:7101", "127.0.0.1:7102"]);
        assert_eq!(config.request_timeout, Duration::from_millis(300));
        assert_eq!(config.strategy, PartitionStrategy::Modulo);
        assert_eq!(config.vnodes, 128);
    }

    #[test]
    fn test_requires_two_workers() {
        let config = OrchestratorConfig {
            workers: vec!["w1".to_string(), "w1".to_string()],
            ..Default::default()
        };
        assert_matches!(
            Orchestrator::new(config),
            Err(Error::InsufficientMembers {
                required: 2,
                actual: 1
            })
        );
    }

    #[tokio::test]
    async fn test_get_primary_hit() {
        let (orch, primary, secondary) =
            setup(Behavior::Reply(Response::ok("v")), Behavior::Refuse);

        assert_eq!(orch.route(Request::get("k")).await, Response::ok("v"));
        assert_eq!(orch.transport.calls_to(&primary), 1);
        assert_eq!(orch.transport.calls_to(&secondary), 0);
    }

    #[tokio::test]
    async fn test_get_primary_not_found_is_final() {
        let (orch, _, secondary) = setup(
            Behavior::Reply(Response::not_found()),
            Behavior::Reply(Response::ok("v")),
        );

        assert_eq!(orch.route(Request::get("k")).await, Response::not_found());
        assert_eq!(orch.transport.calls_to(&secondary), 0);
    }

    #[tokio::test]
    async fn test_get_falls_back_on_refused_primary() {
        let (orch, primary, secondary) =
            setup(Behavior::Refuse, Behavior::Reply(Response::ok("v")));

        assert_eq!(orch.route(Request::get("k")).await, Response::ok("v"));
        assert_eq!(orch.transport.calls_to(&primary), 1);
        assert_eq!(orch.transport.calls_to(&secondary), 1);
    }

    #[tokio::test]
    async fn test_get_falls_back_on_error_status() {
        let (orch, _, _) = setup(
            Behavior::Reply(Response::error()),
            Behavior::Reply(Response::not_found()),
        );

        assert_eq!(orch.route(Request::get("k")).await, Response::not_found());
    }

    #[tokio::test]
    async fn test_get_both_fail() {
        let (orch, _, _) = setup(Behavior::Refuse, Behavior::Reply(Response::error()));
        assert_eq!(orch.route(Request::get("k")).await, Response::error());
    }

    #[tokio::test]
    async fn test_get_timeout_shares_deadline() {
        let (orch, _, secondary) = setup(Behavior::Hang, Behavior::Reply(Response::ok("v")));

        let started = std::time::Instant::now();
        let res = orch.route(Request::get("k")).await;

        // The hung primary used up the whole budget, so the fallback is never tried
        assert_eq!(res, Response::error());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(orch.transport.calls_to(&secondary), 0);
    }

    #[tokio::test]
    async fn test_set_requires_both_replicas() {
        let (orch, primary, secondary) = setup(
            Behavior::Reply(Response::ok_empty()),
            Behavior::Reply(Response::ok_empty()),
        );

        assert_eq!(orch.route(Request::set("k", "v")).await, Response::ok_empty());
        assert_eq!(orch.transport.calls_to(&primary), 1);
        assert_eq!(orch.transport.calls_to(&secondary), 1);
    }

    #[tokio::test]
    async fn test_set_one_replica_down_is_error() {
        let (orch, _, secondary) = setup(Behavior::Reply(Response::ok_empty()), Behavior::Refuse);

        assert_eq!(orch.route(Request::set("k", "v")).await, Response::error());
        assert_eq!(orch.transport.calls_to(&secondary), 1);
    }

    #[tokio::test]
    async fn test_set_hung_replica_times_out() {
        let (orch, _, _) = setup(Behavior::Hang, Behavior::Reply(Response::ok_empty()));

        let started = std::time::Instant::now();
        assert_eq!(orch.route(Request::set("k", "v")).await, Response::error());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_members_is_error() {
        let transport = MockTransport::default();
        let orch = Orchestrator::with_transport(config(), transport).unwrap();

        orch.remove_worker("w1");
        orch.remove_worker("w2");
        assert!(orch.members().is_empty());

        assert_eq!(orch.route(Request::get("k")).await, Response::error());
        assert!(orch.transport.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_membership_changes() {
        let orch = Orchestrator::with_transport(config(), MockTransport::default()).unwrap();

        orch.add_worker("w3");
        orch.add_worker("w3");
        assert_eq!(orch.members(), vec!["w1", "w2", "w3"]);

        orch.remove_worker("w1");
        assert_eq!(orch.members(), vec!["w2", "w3"]);

        let owners = orch.owners_for(b"k").unwrap();
        assert!(!owners.contains("w1"));
    }

    #[tokio::test]
    async fn test_consistent_ring_strategy() {
        let config = OrchestratorConfig {
            strategy: PartitionStrategy::ConsistentRing,
            vnodes: 0,
            ..config()
        };
        let transport = MockTransport::default()
            .with("w1", Behavior::Reply(Response::ok_empty()))
            .with("w2", Behavior::Reply(Response::ok_empty()));
        let orch = Orchestrator::with_transport(config, transport).unwrap();

        assert_eq!(orch.route(Request::set("k", "v")).await, Response::ok_empty());
        assert_eq!(orch.transport.calls_to("w1"), 1);
        assert_eq!(orch.transport.calls_to("w2"), 1);
    }
}
