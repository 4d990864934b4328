use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// AuditEntry
///
/// One record handed to the audit sink.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub category: String,
    pub action: String,
    pub success: bool,
    pub message: String,
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// AuditSink
///
/// Receives security-relevant events. Writing is best effort: a sink that cannot
/// persist an entry must not fail the request.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write_log(
        &self,
        category: &str,
        action: &str,
        success: bool,
        message: &str,
        origin: Option<&str>,
    );
}

pub type AuditState = Arc<dyn AuditSink>;

/// TracingAuditSink
///
/// Emits audit entries as structured events on the `audit` target.
#[derive(Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn write_log(
        &self,
        category: &str,
        action: &str,
        success: bool,
        message: &str,
        origin: Option<&str>,
    ) {
        if success {
            tracing::info!(target: "audit", category, action, origin, "{}", message);
        } else {
            tracing::warn!(target: "audit", category, action, origin, "{}", message);
        }
    }
}

/// MemoryAuditSink
///
/// Keeps every entry in memory so tests can assert on what was written.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write_log(
        &self,
        category: &str,
        action: &str,
        success: bool,
        message: &str,
        origin: Option<&str>,
    ) {
        let entry = AuditEntry {
            category: category.to_string(),
            action: action.to_string(),
            success,
            message: message.to_string(),
            origin: origin.map(str::to_string),
            created_at: Utc::now(),
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
