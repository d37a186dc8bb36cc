//! Sequential stage gating over a canonical [`ProcessGraph`].
//!
//! # Rules
//!
//! - Stage 0 is always unlockable.
//! - Stage *i* is unlockable iff stage *i-1* is unlockable and its derived
//!   status is [`StageStatus::Finish`]. Chaining through the predecessor's
//!   own gate means a locked stage never unlocks its successor, even when its
//!   tasks were all checked by some other writer.
//! - An errored stage does not unlock its successor.
//!
//! # Derived status
//!
//! Evaluated in this order:
//!
//! 1. `finish`: at least one task, all of them checked.
//! 2. `error`: a defect is flagged on the stage.
//! 3. `process`: unlockable and at least one task checked.
//! 4. `wait`: everything else.
//!
//! Evaluation is pure; re-run it on every read.

use serde::Serialize;

use crate::model::{ProcessGraph, Stage, StageStatus};

/// Gate state of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageGate {
    pub stage_id: String,
    pub unlockable: bool,
    pub status: StageStatus,
    pub checked: usize,
    pub total: usize,
}

/// Gate state of every stage, in graph order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub stages: Vec<StageGate>,
}

impl GateReport {
    /// Look up a stage's gate by id.
    #[must_use]
    pub fn get(&self, stage_id: &str) -> Option<&StageGate> {
        self.stages.iter().find(|gate| gate.stage_id == stage_id)
    }

    /// Return the gate at a graph position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&StageGate> {
        self.stages.get(index)
    }

    /// First stage that is not finished before `index`; the one holding it locked.
    #[must_use]
    pub fn blocker_of(&self, index: usize) -> Option<&StageGate> {
        self.stages
            .iter()
            .take(index)
            .find(|gate| gate.status != StageStatus::Finish)
    }

    #[must_use]
    pub fn all_finished(&self) -> bool {
        !self.stages.is_empty()
            && self
                .stages
                .iter()
                .all(|gate| gate.status == StageStatus::Finish)
    }

    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|gate| gate.status == StageStatus::Finish)
            .count()
    }
}

/// Derived status of a single stage given whether it is unlockable.
#[must_use]
pub fn derive_status(stage: &Stage, unlockable: bool) -> StageStatus {
    if stage.is_complete() {
        StageStatus::Finish
    } else if stage.is_flagged() {
        StageStatus::Error
    } else if unlockable && stage.checked_count() > 0 {
        StageStatus::Process
    } else {
        StageStatus::Wait
    }
}

/// Compute unlock state and derived status for every stage.
#[must_use]
pub fn evaluate(graph: &ProcessGraph) -> GateReport {
    let mut stages = Vec::with_capacity(graph.len());
    let mut unlockable = true;

    for stage in &graph.stages {
        let status = derive_status(stage, unlockable);
        stages.push(StageGate {
            stage_id: stage.id.clone(),
            unlockable,
            status,
            checked: stage.checked_count(),
            total: stage.tasks.len(),
        });
        unlockable = unlockable && status == StageStatus::Finish;
    }

    GateReport { stages }
}
