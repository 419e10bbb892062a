//! CuckooCache - Distributed Replicated In-Memory Cache
//!
//! A stateless orchestrator routes client requests to a set of cache workers.
//! Every key is owned by two workers chosen by a pluggable partitioner; reads
//! fall back from the primary to the secondary, writes go to both.
//!
//! # Architecture
//!
//! ```text
//! ┌────────┐   binary protocol   ┌──────────────┐   binary protocol   ┌──────────┐
//! │ client │────────────────────▶│ Orchestrator │────────────────────▶│ Worker 1 │
//! └────────┘                     │ (Partitioner)│──────────┐          │ LruCache │
//!                                └──────────────┘          │          └──────────┘
//!                                                          │          ┌──────────┐
//!                                                          └─────────▶│ Worker 2 │
//!                                                                     │ LruCache │
//!                                                                     └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`proto`] - Wire format, frame types and codecs
//! - [`store`] - Worker-side store capability and the LRU cache
//! - [`partition`] - Modulo and consistent-ring key ownership
//! - [`worker`] - Worker service
//! - [`orchestrator`] - Routing and replication service
//! - [`client`] - Protocol client
//! - [`service`] - Connection loop shared by both services
//! - [`metrics`] - Prometheus metrics and health endpoint
//! - [`error`] - Error types

pub mod client;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod partition;
pub mod proto;
pub mod service;
pub mod store;
pub mod worker;

// Re-export commonly used types
pub use client::CacheClient;
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use partition::{ConsistentRing, ModuloPartitioner, Owners, PartitionStrategy, Partitioner};
pub use proto::{FrameLimits, Op, ProtocolError, Request, Response, Status};
pub use store::{KvStore, LruCache};
pub use worker::{Worker, WorkerConfig};
