//! Legacy workflow shape: one workflow per stage, a flat list of names, and a
//! stage-level `isDone` flag that older consumers read directly.

use serde::{Deserialize, Serialize};

use super::StoredDefect;
use super::keyed::Keyed;

/// A legacy workflow entry under `products/{id}/workflows/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyWorkflow {
    pub workflow_name: Vec<String>,
    #[serde(default)]
    pub workflow_code: Vec<String>,
    #[serde(default)]
    pub department_code: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub consultant_id: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub checklist: Option<Keyed<ChecklistTask>>,
    #[serde(default)]
    pub defect: Option<StoredDefect>,
}

/// A checklist entry as the legacy UI writes it (snake_case fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistTask {
    #[serde(default)]
    pub id: Option<String>,
    pub task_name: String,
    #[serde(default)]
    pub task_order: Option<i64>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_by: Option<String>,
    #[serde(
        default,
        rename = "checkedByName",
        skip_serializing_if = "Option::is_none"
    )]
    pub checked_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Synthesized task id for a legacy stage without a stored checklist.
#[must_use]
pub fn synthesized_task_id(workflow_key: &str, index: usize) -> String {
    format!("task_{workflow_key}_{index}")
}
