// crates/stratus-gateway/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured JSON-lines audit events for request handling.
// Purpose: Record one event per request without failing the request.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every handled request yields one [`RequestAuditEvent`]. Sinks serialize
//! events as single JSON lines; write failures are swallowed so logging can
//! never change a response. Startup posture warnings use
//! [`PostureAuditEvent`] through the same sinks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::protocol::WireConvention;
use crate::telemetry::RequestOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Per-request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request id returned to the client.
    pub request_id: String,
    /// Resolved namespace.
    pub namespace: String,
    /// Wire convention the request was dispatched under.
    pub convention: Option<WireConvention>,
    /// Target service when dispatch succeeded.
    pub service: Option<&'static str>,
    /// Target operation when dispatch succeeded.
    pub operation: Option<&'static str>,
    /// HTTP status sent.
    pub status: u16,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// Provider error code when the request failed.
    pub error_code: Option<String>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

/// Inputs required to construct a request audit event.
pub struct RequestAuditEventParams {
    /// Request id returned to the client.
    pub request_id: String,
    /// Resolved namespace.
    pub namespace: String,
    /// Wire convention when known.
    pub convention: Option<WireConvention>,
    /// Target service when known.
    pub service: Option<&'static str>,
    /// Target operation when known.
    pub operation: Option<&'static str>,
    /// HTTP status sent.
    pub status: u16,
    /// Provider error code when the request failed.
    pub error_code: Option<String>,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

impl RequestAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        let outcome =
            if params.error_code.is_some() { RequestOutcome::Error } else { RequestOutcome::Ok };
        Self {
            event: "gateway_request",
            timestamp_ms: now_ms(),
            request_id: params.request_id,
            namespace: params.namespace,
            convention: params.convention,
            service: params.service,
            operation: params.operation,
            status: params.status,
            outcome,
            error_code: params.error_code,
            error_kind: params.error_kind,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            latency_ms: params.latency_ms,
        }
    }
}

/// Startup posture audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct PostureAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Posture warning kind.
    pub kind: &'static str,
    /// Human-readable detail.
    pub message: String,
}

impl PostureAuditEvent {
    /// Creates a posture warning with a consistent timestamp.
    #[must_use]
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            event: "posture_warning",
            timestamp_ms: now_ms(),
            kind,
            message: message.into(),
        }
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway events.
pub trait AuditSink: Send + Sync {
    /// Records a request event.
    fn record(&self, event: &RequestAuditEvent);
    /// Records a startup posture warning.
    fn record_posture(&self, _event: &PostureAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that writes JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized payload line.
    fn write_line<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        Self::write_line(event);
    }

    fn record_posture(&self, event: &PostureAuditEvent) {
        Self::write_line(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// Append-only file handle guarded for concurrent writers.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens a file-backed audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized payload line.
    fn write_line<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        self.write_line(event);
    }

    fn record_posture(&self, event: &PostureAuditEvent) {
        self.write_line(event);
    }
}

/// Audit sink that discards events.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &RequestAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn sample(error_code: Option<String>) -> RequestAuditEvent {
        RequestAuditEvent::new(RequestAuditEventParams {
            request_id: "req-1".to_string(),
            namespace: "default".to_string(),
            convention: Some(WireConvention::QueryAction),
            service: Some("sqs"),
            operation: Some("CreateQueue"),
            status: 200,
            error_code,
            error_kind: None,
            request_bytes: 10,
            response_bytes: 20,
            latency_ms: 1,
        })
    }

    #[test]
    fn outcome_follows_error_code() {
        assert_eq!(sample(None).outcome, RequestOutcome::Ok);
        assert_eq!(sample(Some("Boom".to_string())).outcome, RequestOutcome::Error);
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(&sample(None));
        sink.record_posture(&PostureAuditEvent::new("memory_store", "state is not durable"));
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "gateway_request");
        assert_eq!(lines[0]["convention"], "query_action");
        assert_eq!(lines[1]["kind"], "memory_store");
    }
}
