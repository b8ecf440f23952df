//! Audit records for each handled request.
//!
//! The orchestrator hands one [`AuditRecord`] per handled request (rate
//! limited ones included) to an [`AuditSink`]. Persisting it is the host
//! application's job; the default sink only logs. Records never carry the
//! message text or answer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::types::{ChatRequest, ChatResponse, Mode};

/// What happened for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub caller_id: String,
    pub patient_id: Option<String>,
    pub mode: Mode,
    /// "generated", "cached", "fallback" or "rate_limited".
    pub outcome: &'static str,
    /// `None` when the request was rate limited.
    pub model_used: Option<String>,
    pub is_fallback: bool,
    pub cached: bool,
    pub citation_count: usize,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn answered(request: &ChatRequest, response: &ChatResponse, latency: Duration) -> Self {
        let outcome = if response.cached {
            "cached"
        } else if response.is_fallback {
            "fallback"
        } else {
            "generated"
        };
        Self {
            caller_id: request.caller_id.clone(),
            patient_id: request.patient_id().map(str::to_string),
            mode: request.mode,
            outcome,
            model_used: Some(response.model_used.clone()),
            is_fallback: response.is_fallback,
            cached: response.cached,
            citation_count: response.citations.len(),
            latency,
            timestamp: Utc::now(),
        }
    }

    pub fn rate_limited(request: &ChatRequest, latency: Duration) -> Self {
        Self {
            caller_id: request.caller_id.clone(),
            patient_id: request.patient_id().map(str::to_string),
            mode: request.mode,
            outcome: "rate_limited",
            model_used: None,
            is_fallback: false,
            cached: false,
            citation_count: 0,
            latency,
            timestamp: Utc::now(),
        }
    }
}

/// Receives audit records. Must not block: called inline on the request path.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Logs each record at `info` under the `medgate::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(
            target: "medgate::audit",
            caller = %record.caller_id,
            patient = record.patient_id.as_deref().unwrap_or("-"),
            mode = record.mode.as_str(),
            outcome = record.outcome,
            model = record.model_used.as_deref().unwrap_or("-"),
            fallback = record.is_fallback,
            cached = record.cached,
            citations = record.citation_count,
            latency_ms = record.latency.as_millis() as u64,
            "request handled"
        );
    }
}
