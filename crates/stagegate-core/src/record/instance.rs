//! Process-instance shape: instances of a process template, each carrying
//! typed stages with structured task lists.

use serde::Deserialize;

use super::StoredDefect;
use super::keyed::Keyed;

/// An entry under `products/{id}/processInstances/{key}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub stages: Keyed<StageInstance>,
    #[serde(default)]
    pub process_order: Option<i64>,
    #[serde(default)]
    pub process_template_id: Option<String>,
    #[serde(default)]
    pub process_template_name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageInstance {
    pub name: String,
    #[serde(default)]
    pub stage_id: Option<String>,
    #[serde(default)]
    pub stage_order: Option<i64>,
    #[serde(default)]
    pub department_code: Option<String>,
    #[serde(default)]
    pub assigned_members: Vec<String>,
    #[serde(default)]
    pub tasks: Keyed<TaskInstance>,
    #[serde(default)]
    pub defect: Option<StoredDefect>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    pub name: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_order: Option<i64>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub checked_by: Option<String>,
    #[serde(default)]
    pub checked_by_name: Option<String>,
    #[serde(default)]
    pub checked_at: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::ProcessInstance;
    use serde_json::json;

    #[test]
    fn instance_tolerates_stored_status_fields() {
        let instance: ProcessInstance = serde_json::from_value(json!({
            "processOrder": 1,
            "status": "in_progress",
            "stages": [{
                "stageId": "s1",
                "stageOrder": 1,
                "name": "Vệ sinh",
                "status": "completed",
                "tasks": [{"taskId": "t1", "taskOrder": 1, "name": "Ngâm", "checked": false}]
            }]
        }))
        .unwrap();

        let (stage_key, stage) = instance.stages.iter().next().unwrap();
        assert_eq!(stage_key, "0");
        assert_eq!(stage.stage_id.as_deref(), Some("s1"));
        assert_eq!(stage.tasks.len(), 1);
    }

    #[test]
    fn instance_requires_stages() {
        assert!(serde_json::from_value::<ProcessInstance>(json!({"processOrder": 1})).is_err());
    }

    #[test]
    fn stage_requires_name() {
        assert!(
            serde_json::from_value::<ProcessInstance>(json!({"stages": {"s1": {"tasks": []}}}))
                .is_err()
        );
    }
}
