//! Metrics and Health
//!
//! Process-wide prometheus counters for both node roles, plus an optional
//! HTTP endpoint serving `/metrics` and `/healthz`.

mod registry;
mod server;

pub use registry::{metrics, Metrics};
pub use server::{serve, HealthResponse};

/// Which service a process is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Worker,
    Orchestrator,
}

impl Role {
    /// Label value used in metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Orchestrator => "orchestrator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
