//! Telemetry Module for the stream buffer filter
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use crate::buffer::BufferStats;
use crate::methods::MethodNotAllowed;
use log::{info, warn};
use serde::Serialize;

/// Audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Verb routed to a handler
    RequestAccepted,
    /// Verb rejected with 405
    MethodNotAllowed,
    /// Request body fully framed into records
    BodyFramed,
    /// Request body rejected with 413
    RecordTooLarge,
}

/// Audit event for logging
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Verbs that would have been accepted (405 only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer: Option<BufferStats>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            context_id: None,
            method: None,
            path: None,
            allow: None,
            reason: None,
            records: None,
            body_bytes: None,
            buffer: None,
        }
    }

    pub fn with_context_id(mut self, id: u32) -> Self {
        self.context_id = Some(id);
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Set record and byte counts
    pub fn with_body(mut self, records: usize, bytes: usize) -> Self {
        self.records = Some(records);
        self.body_bytes = Some(bytes);
        self
    }

    pub fn with_buffer(mut self, stats: BufferStats) -> Self {
        self.buffer = Some(stats);
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                AuditEventType::MethodNotAllowed | AuditEventType::RecordTooLarge => {
                    warn!("[STREAM-BUFFER-AUDIT] {}", json);
                }
                _ => {
                    info!("[STREAM-BUFFER-AUDIT] {}", json);
                }
            },
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
            }
        }
    }
}

/// Create a 405 audit event
pub fn audit_method_not_allowed(method: &str, err: &MethodNotAllowed) -> AuditEvent {
    let mut event = AuditEvent::new(AuditEventType::MethodNotAllowed).with_method(method);
    event.allow = Some(err.allow_header());
    event
}

pub fn audit_accepted(method: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::RequestAccepted).with_method(method)
}

/// Create a body framed audit event
pub fn audit_body_framed(records: usize, bytes: usize, stats: BufferStats) -> AuditEvent {
    AuditEvent::new(AuditEventType::BodyFramed)
        .with_body(records, bytes)
        .with_buffer(stats)
}

pub fn audit_record_too_large(reason: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::RecordTooLarge).with_reason(reason)
}
