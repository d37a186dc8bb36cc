//! Display-only completion figures for a process.

use serde::Serialize;
use std::fmt;

use crate::gate::GateReport;
use crate::model::{ProcessGraph, StageStatus};

/// Pointer to the stage technicians should be working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCursor {
    pub index: usize,
    pub stage_id: String,
    pub name: String,
    pub status: StageStatus,
}

/// Completion summary of one product's process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessProgress {
    /// Stages whose derived status is `finish`.
    pub finished: usize,
    pub total: usize,
    /// `round(100 * finished / total)`, half up; `0` for an empty process.
    pub percent: u8,
    /// `None` when the process is complete or nothing is workable.
    pub current_stage: Option<StageCursor>,
    /// `true` only when there is at least one stage and all are finished.
    pub complete: bool,
}

impl fmt::Display for ProcessProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}%)", self.finished, self.total, self.percent)
    }
}

/// Integer percentage with round-half-up; `0` when `total == 0`.
#[must_use]
pub fn percent_complete(finished: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let finished = finished.min(total) as u128;
    let total = total as u128;
    let rounded = (200 * finished + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Summarize completion and pick the current stage.
///
/// The current stage is the first `process` stage; failing that, the first
/// unlockable `wait` stage, and then the first unlockable `error` stage so a
/// defect holding the line still shows as current.
#[must_use]
pub fn summarize(graph: &ProcessGraph, report: &GateReport) -> ProcessProgress {
    let total = report.stages.len();
    let finished = report.finished_count();
    let complete = report.all_finished();

    let current_index = report
        .stages
        .iter()
        .position(|gate| gate.status == StageStatus::Process)
        .or_else(|| {
            report
                .stages
                .iter()
                .position(|gate| gate.status == StageStatus::Wait && gate.unlockable)
        })
        .or_else(|| {
            report
                .stages
                .iter()
                .position(|gate| gate.status == StageStatus::Error && gate.unlockable)
        });

    let current_stage = if complete {
        None
    } else {
        current_index.and_then(|index| {
            let stage = graph.stages.get(index)?;
            Some(StageCursor {
                index,
                stage_id: stage.id.clone(),
                name: stage.display_name(),
                status: report.stages[index].status,
            })
        })
    };

    ProcessProgress {
        finished,
        total,
        percent: percent_complete(finished, total),
        current_stage,
        complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::evaluate;
    use crate::model::OwnerRef;
    use crate::normalize::normalize;
    use serde_json::json;

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(percent_complete(0, 3), 0);
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(2, 3), 67);
        assert_eq!(percent_complete(1, 8), 13);
        assert_eq!(percent_complete(1, 200), 1);
        assert_eq!(percent_complete(3, 3), 100);
        assert_eq!(percent_complete(0, 0), 0);
    }

    #[test]
    fn empty_graph_has_no_current_stage() {
        let graph = crate::model::ProcessGraph::empty(OwnerRef::order("DH001"), "p1");
        let progress = summarize(&graph, &evaluate(&graph));
        assert_eq!(progress.percent, 0);
        assert!(progress.current_stage.is_none());
        assert!(!progress.complete);
    }

    #[test]
    fn current_stage_prefers_process_then_unlockable_wait() {
        let product = json!({"workflows": {
            "a": {"workflowName": ["Vệ sinh"], "order": 0, "checklist": [
                {"id": "t1", "task_name": "Ngâm", "checked": true, "checked_by": "m", "checked_at": 1},
                {"id": "t2", "task_name": "Sấy", "checked": false}
            ]},
            "b": {"workflowName": ["Nhuộm"], "order": 1}
        }});
        let graph = normalize(&OwnerRef::order("DH001"), "p1", &product).unwrap();
        let progress = summarize(&graph, &evaluate(&graph));
        let current = progress.current_stage.unwrap();
        assert_eq!(current.stage_id, "a");
        assert_eq!(current.status, StageStatus::Process);

        let fresh = json!({"workflows": {"a": {"workflowName": ["Vệ sinh"]}}});
        let graph = normalize(&OwnerRef::order("DH001"), "p1", &fresh).unwrap();
        let progress = summarize(&graph, &evaluate(&graph));
        assert_eq!(progress.current_stage.as_ref().unwrap().status, StageStatus::Wait);
        assert_eq!(progress.to_string(), "0/1 (0%)");
    }

    #[test]
    fn blocking_defect_becomes_current_stage() {
        let product = json!({"workflows": {
            "a": {"workflowName": ["Vệ sinh"], "order": 0,
                  "defect": {"reportedBy": "mem_qc", "reportedAt": 3}},
            "b": {"workflowName": ["Nhuộm"], "order": 1}
        }});
        let graph = normalize(&OwnerRef::order("DH001"), "p1", &product).unwrap();
        let progress = summarize(&graph, &evaluate(&graph));
        let current = progress.current_stage.unwrap();
        assert_eq!(current.stage_id, "a");
        assert_eq!(current.status, StageStatus::Error);
        assert!(!progress.complete);
    }

    #[test]
    fn finished_graph_is_complete_without_cursor() {
        let product = json!({"workflows": {"a": {"workflowName": ["Vệ sinh"], "checklist": [
            {"id": "t1", "task_name": "Ngâm", "checked": true, "checked_by": "m", "checked_at": 1}
        ]}}});
        let graph = normalize(&OwnerRef::order("DH001"), "p1", &product).unwrap();
        let progress = summarize(&graph, &evaluate(&graph));
        assert!(progress.complete);
        assert!(progress.current_stage.is_none());
        assert_eq!(progress.percent, 100);
    }
}
