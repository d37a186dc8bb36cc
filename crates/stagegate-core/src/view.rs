//! Display-ready tracking view of one product.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::directory::Directory;
use crate::gate::GateReport;
use crate::model::{OwnerRef, ProcessGraph, ProcessShape, StageStatus};
use crate::progress::ProcessProgress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: String,
    pub name: String,
    pub checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefectView {
    pub reported_by: String,
    pub reported_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub unlockable: bool,
    pub checked: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub assignees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defect: Option<DefectView>,
    pub tasks: Vec<TaskView>,
}

/// Everything a tracking screen needs, from one read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingView {
    pub owner: OwnerRef,
    pub product_id: String,
    pub shape: ProcessShape,
    pub progress: ProcessProgress,
    pub stages: Vec<StageView>,
}

/// Join graph, gates and progress, resolving names through `directory`.
///
/// A checker's name prefers the directory, then the name captured at check
/// time, then the raw reference.
#[must_use]
pub fn build(
    graph: &ProcessGraph,
    report: &GateReport,
    progress: ProcessProgress,
    directory: &Directory,
) -> TrackingView {
    let stages = graph
        .stages
        .iter()
        .zip(&report.stages)
        .map(|(stage, gate)| StageView {
            id: stage.id.clone(),
            name: stage.display_name(),
            status: gate.status,
            unlockable: gate.unlockable,
            checked: gate.checked,
            total: gate.total,
            department: stage
                .department
                .as_ref()
                .map(|dept| directory.department_name(dept)),
            assignees: stage
                .assigned_members
                .iter()
                .map(|member| directory.member_name(member))
                .collect(),
            defect: stage.defect.as_ref().map(|defect| DefectView {
                reported_by: directory.member_name(&defect.reported_by),
                reported_at: defect.reported_at,
                note: defect.note.clone(),
            }),
            tasks: stage
                .tasks
                .iter()
                .map(|task| {
                    let check = task.check.as_ref();
                    TaskView {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        checked: task.is_checked(),
                        checked_by: check.map(|c| {
                            directory
                                .member(&c.by)
                                .map(|m| m.name.clone())
                                .or_else(|| c.by_name.clone())
                                .unwrap_or_else(|| c.by.as_str().to_string())
                        }),
                        checked_at: check.map(|c| c.at),
                        notes: task.notes.clone(),
                    }
                })
                .collect(),
        })
        .collect();

    TrackingView {
        owner: graph.owner.clone(),
        product_id: graph.product_id.clone(),
        shape: graph.shape,
        progress,
        stages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::evaluate;
    use crate::normalize::normalize;
    use crate::progress::summarize;
    use serde_json::json;

    #[test]
    fn names_resolve_with_fallbacks() {
        let product = json!({"processInstances": {"p": {"stages": {"s": {
            "name": "Mạ",
            "departmentCode": "DEPT_001",
            "assignedMembers": ["mem_01", "ghost"],
            "tasks": [
                {"taskId": "t1", "name": "Ngâm", "checked": true, "checkedBy": "mem_01", "checkedAt": 1},
                {"taskId": "t2", "name": "Mạ vàng", "checked": true, "checkedBy": "mem_77",
                 "checkedByName": "Huy", "checkedAt": 2},
                {"taskId": "t3", "name": "Lau", "checked": true, "checkedBy": "mem_88", "checkedAt": 3}
            ]
        }}}}});
        let graph = normalize(&OwnerRef::order("DH001"), "p1", &product).unwrap();
        let report = evaluate(&graph);
        let directory = Directory::from_records(
            Some(&json!({"mem_01": {"name": "Lan"}})),
            Some(&json!({"DEPT_001": {"name": "Phòng Xi Mạ"}})),
        );
        let view = build(&graph, &report, summarize(&graph, &report), &directory);

        let stage = &view.stages[0];
        assert_eq!(stage.department.as_deref(), Some("Phòng Xi Mạ"));
        assert_eq!(stage.assignees, vec!["ghost", "Lan"]);
        assert_eq!(stage.tasks[0].checked_by.as_deref(), Some("Lan"));
        assert_eq!(stage.tasks[1].checked_by.as_deref(), Some("Huy"));
        assert_eq!(stage.tasks[2].checked_by.as_deref(), Some("mem_88"));
        assert_eq!(stage.status, StageStatus::Finish);
        assert!(view.progress.complete);
    }
}
