//! Audit trail for access and destructive operations.
//!
//! Emitted on the `spanstat::audit` tracing target so deployments can route it
//! separately from operational logs.

use spanstat_shared::Filter;
use tracing::{info, warn};

pub const AUDIT_TARGET: &str = "spanstat::audit";

/// Result of checking a gRPC request's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    MissingHeader,
    MalformedHeader,
    WrongToken,
}

impl AuthOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::Accepted => "accepted",
            AuthOutcome::MissingHeader => "missing_header",
            AuthOutcome::MalformedHeader => "malformed_header",
            AuthOutcome::WrongToken => "wrong_token",
        }
    }
}

pub fn grpc_auth(outcome: AuthOutcome) {
    if outcome == AuthOutcome::Accepted {
        info!(target: AUDIT_TARGET, event = "grpc_auth", outcome = outcome.as_str());
    } else {
        warn!(target: AUDIT_TARGET, event = "grpc_auth", outcome = outcome.as_str());
    }
}

/// Rows removed by a DeleteEvents call, with the filter that selected them.
pub fn events_deleted(filter: &Filter, rows: u64) {
    info!(
        target: AUDIT_TARGET,
        event = "events_deleted",
        trace_id = filter.trace_id.as_deref().unwrap_or("*"),
        origin = filter.origin.as_deref().unwrap_or("*"),
        event_name = filter.event_name.as_deref().unwrap_or("*"),
        rows,
    );
}

pub fn admin_http_request(path: &str, status: u16) {
    info!(target: AUDIT_TARGET, event = "admin_http_request", path, status);
}
