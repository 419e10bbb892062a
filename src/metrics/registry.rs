//! Prometheus Registry

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::proto::{Op, Status};

use super::Role;

static METRICS: Lazy<Metrics> =
    Lazy::new(|| Metrics::new().expect("static metric definitions are valid"));

/// Process-wide metrics
pub fn metrics() -> &'static Metrics {
    &METRICS
}

/// All counters exported by a cache node
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    responses: IntCounterVec,
    connections: IntCounterVec,
    protocol_errors: IntCounterVec,
    worker_call_failures: IntCounterVec,
    replica_divergence: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    cache_evictions: IntCounter,
    cache_entries: IntGauge,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("cuckoocache".to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Decoded requests by role and operation"),
            &["role", "op"],
        )?;
        let responses = IntCounterVec::new(
            Opts::new("responses_total", "Responses sent by role and status"),
            &["role", "status"],
        )?;
        let connections = IntCounterVec::new(
            Opts::new("connections_total", "Accepted connections by role"),
            &["role"],
        )?;
        let protocol_errors = IntCounterVec::new(
            Opts::new(
                "protocol_errors_total",
                "Connections closed because of a framing error",
            ),
            &["role"],
        )?;
        let worker_call_failures = IntCounterVec::new(
            Opts::new(
                "worker_call_failures_total",
                "Failed orchestrator to worker calls by reason",
            ),
            &["reason"],
        )?;
        let replica_divergence = IntCounter::new(
            "replica_divergence_total",
            "SET requests acknowledged by exactly one replica",
        )?;
        let cache_hits = IntCounter::new("cache_hits_total", "Worker cache hits")?;
        let cache_misses = IntCounter::new("cache_misses_total", "Worker cache misses")?;
        let cache_evictions =
            IntCounter::new("cache_evictions_total", "Entries evicted from the worker cache")?;
        let cache_entries = IntGauge::new("cache_entries", "Entries held by the worker cache")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(responses.clone()))?;
        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(protocol_errors.clone()))?;
        registry.register(Box::new(worker_call_failures.clone()))?;
        registry.register(Box::new(replica_divergence.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_evictions.clone()))?;
        registry.register(Box::new(cache_entries.clone()))?;

        Ok(Self {
            registry,
            requests,
            responses,
            connections,
            protocol_errors,
            worker_call_failures,
            replica_divergence,
            cache_hits,
            cache_misses,
            cache_evictions,
            cache_entries,
        })
    }

    pub fn record_request(&self, role: Role, op: Op) {
        self.requests
            .with_label_values(&[role.as_str(), op.as_str()])
            .inc();
    }

    pub fn record_response(&self, role: Role, status: Status) {
        self.responses
            .with_label_values(&[role.as_str(), status.as_str()])
            .inc();
    }

    pub fn record_connection(&self, role: Role) {
        self.connections.with_label_values(&[role.as_str()]).inc();
    }

    pub fn record_protocol_error(&self, role: Role) {
        self.protocol_errors.with_label_values(&[role.as_str()]).inc();
    }

    pub fn record_worker_call_failure(&self, reason: &str) {
        self.worker_call_failures.with_label_values(&[reason]).inc();
    }

    pub fn record_replica_divergence(&self) {
        self.replica_divergence.inc();
    }

    /// Record the outcome of a cache lookup
    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }

    pub fn record_eviction(&self) {
        self.cache_evictions.inc();
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.cache_entries.set(entries as i64);
    }

    /// Render every metric in the prometheus text format
    pub fn encode(&self) -> prometheus::Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
