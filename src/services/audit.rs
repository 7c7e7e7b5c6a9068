//! Operation Audit Log
//!
//! Bounded in-memory record of every step the copilot processed, with simple
//! filtering and summary statistics. Oldest records are dropped at capacity.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::plan::{ResultKind, StepResult};

/// Default number of records kept.
pub const DEFAULT_AUDIT_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Succeeded,
    Failed,
    Skipped,
    Recorded,
}

impl AuditStatus {
    fn from_result(result: &StepResult) -> Self {
        match result.kind {
            ResultKind::Skipped => AuditStatus::Skipped,
            ResultKind::Recorded => AuditStatus::Recorded,
            ResultKind::Executed if result.success => AuditStatus::Succeeded,
            ResultKind::Executed => AuditStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub plan_id: String,
    pub step_id: String,
    pub operation: String,
    pub status: AuditStatus,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub message: String,
}

/// Record filter; `None` fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub session_id: Option<String>,
    pub operation: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn matches(&self, record: &AuditRecord) -> bool {
        self.session_id
            .as_ref()
            .map_or(true, |id| &record.session_id == id)
            && self
                .operation
                .as_ref()
                .map_or(true, |op| &record.operation == op)
            && self.since.map_or(true, |since| record.timestamp >= since)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStatistics {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub by_operation: BTreeMap<String, usize>,
}

pub struct AuditLog {
    capacity: usize,
    records: Mutex<VecDeque<AuditRecord>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, record: AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            if records.len() >= self.capacity {
                records.pop_front();
            }
            records.push_back(record);
        }
    }

    /// Append one record per step result.
    pub fn record_results(&self, session_id: &str, plan_id: &str, results: &[StepResult]) {
        let now = Utc::now();
        for result in results {
            self.record(AuditRecord {
                timestamp: now,
                session_id: session_id.to_string(),
                plan_id: plan_id.to_string(),
                step_id: result.step_id.clone(),
                operation: result.operation_name.clone(),
                status: AuditStatus::from_result(result),
                elapsed_ms: result.elapsed_ms,
                message: result.message.clone(),
            });
        }
    }

    /// Matching records, oldest first.
    pub fn records(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn statistics(&self) -> AuditStatistics {
        let mut stats = AuditStatistics::default();
        let Ok(records) = self.records.lock() else {
            return stats;
        };
        for record in records.iter() {
            stats.total += 1;
            match record.status {
                AuditStatus::Succeeded => stats.succeeded += 1,
                AuditStatus::Failed => stats.failed += 1,
                AuditStatus::Skipped => stats.skipped += 1,
                AuditStatus::Recorded => {}
            }
            *stats.by_operation.entry(record.operation.clone()).or_insert(0) += 1;
        }
        stats
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}
