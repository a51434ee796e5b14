//! A minimal in-memory task ledger answering `tasks/get`/`tasks/cancel`
//! (spec.md §3 method identity list names `tasks/*`; §7's
//! `url-elicitation-required` error implies a task/elicitation-polling
//! surface exists). This is deliberately not a durable tracker — spec.md
//! lists task tracking itself as an out-of-scope external collaborator —
//! it only has to speak the wire shapes the SDK advertises, so a handler
//! that starts a long-running operation can register progress against an
//! id and answer polling honestly.

use conduit_protocol::tasks::{CancelTaskResult, GetTaskResult, TaskStatus};
use dashmap::DashMap;

struct TaskEntry {
    status: TaskStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
}

/// Keyed by task id. Entries are never evicted automatically; a long-lived
/// server should call [`TaskLedger::remove`] once a caller has observed a
/// terminal status.
#[derive(Default)]
pub struct TaskLedger {
    entries: DashMap<String, TaskEntry>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn start(&self, task_id: impl Into<String>) {
        self.entries
            .insert(task_id.into(), TaskEntry { status: TaskStatus::Working, result: None, error: None });
    }

    pub fn complete(&self, task_id: &str, result: serde_json::Value) {
        if let Some(mut entry) = self.entries.get_mut(task_id) {
            entry.status = TaskStatus::Completed;
            entry.result = Some(result);
        }
    }

    pub fn fail(&self, task_id: &str, error: impl Into<String>) {
        if let Some(mut entry) = self.entries.get_mut(task_id) {
            entry.status = TaskStatus::Failed;
            entry.error = Some(error.into());
        }
    }

    pub fn remove(&self, task_id: &str) {
        self.entries.remove(task_id);
    }

    pub fn get(&self, task_id: &str) -> Option<GetTaskResult> {
        self.entries.get(task_id).map(|entry| GetTaskResult {
            task_id: task_id.to_string(),
            status: entry.status,
            result: entry.result.clone(),
            error: entry.error.clone(),
        })
    }

    /// Marks a working task cancelled. Returns `None` if the task is
    /// unknown; a task already in a terminal state is reported as-is
    /// rather than overwritten.
    pub fn cancel(&self, task_id: &str) -> Option<CancelTaskResult> {
        let mut entry = self.entries.get_mut(task_id)?;
        if matches!(entry.status, TaskStatus::Working | TaskStatus::InputRequired) {
            entry.status = TaskStatus::Cancelled;
        }
        Some(CancelTaskResult { task_id: task_id.to_string(), status: entry.status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_started_task_is_working_until_it_completes() {
        let ledger = TaskLedger::new();
        ledger.start("t-1");
        assert_eq!(ledger.get("t-1").unwrap().status, TaskStatus::Working);
        ledger.complete("t-1", serde_json::json!({"sum": 8}));
        let result = ledger.get("t-1").unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.result, Some(serde_json::json!({"sum": 8})));
    }

    #[test]
    fn cancelling_an_unknown_task_returns_none() {
        let ledger = TaskLedger::new();
        assert!(ledger.cancel("missing").is_none());
    }

    #[test]
    fn cancelling_a_completed_task_does_not_revert_its_status() {
        let ledger = TaskLedger::new();
        ledger.start("t-1");
        ledger.complete("t-1", serde_json::Value::Null);
        let result = ledger.cancel("t-1").unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
    }
}
