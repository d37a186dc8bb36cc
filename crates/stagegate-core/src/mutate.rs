//! Mutation planning: validate a change against a freshly read graph and
//! turn it into the smallest patch under the product record.
//!
//! Planning is pure. The caller reads, plans, and writes the returned
//! [`Patch`] relative to the product path.
//!
//! # Write-back per stored shape
//!
//! | origin                    | task fields written                                          | stage fields            |
//! |---------------------------|--------------------------------------------------------------|-------------------------|
//! | legacy, stored checklist  | `checklist/{slot}/checked, checked_by, checkedByName, checked_at` | `isDone`, `updatedAt`   |
//! | legacy, no checklist yet  | `checklist/{slot}/id, task_name, task_order` for every task, plus the toggled entry's check fields | `isDone`, `updatedAt`   |
//! | process instance          | `tasks/{slot}/checked, checkedBy, checkedByName, checkedAt`  | `updatedAt`             |
//!
//! `isDone` is recomputed from the task set on every legacy toggle and is
//! never read back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;

use crate::error::{NotFoundKind, TrackError};
use crate::gate::{self, GateReport};
use crate::model::{
    ChecklistSource, Defect, MemberRef, ProcessGraph, Stage, StageOrigin, StageStatus, Task,
    TaskCheck,
};
use crate::progress::{self, ProcessProgress};
use crate::record::{StoredDefect, field};
use crate::store::Patch;

/// One task toggle as requested by a technician.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleRequest {
    pub stage_id: String,
    pub task_id: String,
    pub checked: bool,
    pub actor: MemberRef,
    /// Display name recorded next to the actor.
    pub actor_name: Option<String>,
    pub at: DateTime<Utc>,
}

/// A validated change: the patch to write (if any) and the graph it yields.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// `None` when the request matches current state.
    pub patch: Option<Patch>,
    pub before: ProcessGraph,
    pub after: ProcessGraph,
    pub stage_index: usize,
}

/// What a mutation did, computed from the post-write graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub written: bool,
    pub stage_id: String,
    pub stage_status: StageStatus,
    /// The following stage went from locked to unlockable.
    pub next_unlocked: bool,
    pub progress: ProcessProgress,
}

impl Mutation {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.patch.is_none()
    }

    #[must_use]
    pub fn outcome(&self) -> MutationOutcome {
        let before = gate::evaluate(&self.before);
        let after = gate::evaluate(&self.after);
        let next = self.stage_index + 1;
        let was_unlockable = before.at(next).is_some_and(|g| g.unlockable);
        let is_unlockable = after.at(next).is_some_and(|g| g.unlockable);

        MutationOutcome {
            written: self.patch.is_some(),
            stage_id: self.after.stages[self.stage_index].id.clone(),
            stage_status: after
                .at(self.stage_index)
                .map_or(StageStatus::Wait, |g| g.status),
            next_unlocked: is_unlockable && !was_unlockable,
            progress: progress::summarize(&self.after, &after),
        }
    }

    fn unchanged(graph: &ProcessGraph, stage_index: usize) -> Self {
        Self {
            patch: None,
            before: graph.clone(),
            after: graph.clone(),
            stage_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Task toggle
// ---------------------------------------------------------------------------

/// Plan a single task toggle.
///
/// # Errors
///
/// - [`TrackError::NotFound`] for an unknown stage or task.
/// - [`TrackError::StageLocked`] when the stage is not unlockable; this is
///   checked before the no-op short-circuit.
pub fn plan_toggle(graph: &ProcessGraph, request: &ToggleRequest) -> Result<Mutation, TrackError> {
    let (index, stage) = find_stage(graph, &request.stage_id)?;
    let task = stage
        .task(&request.task_id)
        .ok_or_else(|| TrackError::not_found(NotFoundKind::Task, &request.task_id))?;

    let report = gate::evaluate(graph);
    ensure_unlockable(graph, &report, index)?;

    if task.is_checked() == request.checked {
        return Ok(Mutation::unchanged(graph, index));
    }

    let mut after = graph.clone();
    let target = &mut after.stages[index];
    target.updated_at = Some(request.at);
    if let Some(task) = target.task_mut(&request.task_id) {
        task.check = request.checked.then(|| TaskCheck {
            by: request.actor.clone(),
            by_name: request.actor_name.clone(),
            at: request.at,
        });
    }

    let patch = toggle_patch(&after.stages[index], &request.task_id, request.at);
    Ok(Mutation {
        patch: Some(patch),
        before: graph.clone(),
        after,
        stage_index: index,
    })
}

fn toggle_patch(stage: &Stage, task_id: &str, at: DateTime<Utc>) -> Patch {
    let mut patch = Patch::new();
    let base = stage_base(stage);

    match &stage.origin {
        StageOrigin::Legacy { checklist, .. } => {
            let list = format!("{base}/{}", field::CHECKLIST);
            if *checklist == ChecklistSource::Synthesized {
                for task in &stage.tasks {
                    let entry = format!("{list}/{}", task.slot);
                    patch.insert(format!("{entry}/id"), json!(task.id));
                    patch.insert(format!("{entry}/task_name"), json!(task.name));
                    patch.insert(format!("{entry}/task_order"), json!(task.order_in_stage));
                }
            }
            if let Some(task) = stage.task(task_id) {
                insert_check(&mut patch, &format!("{list}/{}", task.slot), task, LEGACY_CHECK_FIELDS);
            }
            patch.insert(format!("{base}/{}", field::IS_DONE), json!(stage.is_complete()));
        }
        StageOrigin::Instance { .. } => {
            if let Some(task) = stage.task(task_id) {
                let entry = format!("{base}/{}/{}", field::TASKS, task.slot);
                insert_check(&mut patch, &entry, task, INSTANCE_CHECK_FIELDS);
            }
        }
    }

    patch.insert(format!("{base}/{}", field::UPDATED_AT), json!(at.timestamp_millis()));
    patch
}

/// `checked`, checker, checker name and check time, as each shape spells them.
type CheckFields = [&'static str; 4];

const LEGACY_CHECK_FIELDS: CheckFields = ["checked", "checked_by", "checkedByName", "checked_at"];
const INSTANCE_CHECK_FIELDS: CheckFields = ["checked", "checkedBy", "checkedByName", "checkedAt"];

/// Check fields of one entry; `null` clears attribution on uncheck.
fn insert_check(patch: &mut Patch, entry: &str, task: &Task, fields: CheckFields) {
    let [checked, by, by_name, at] = fields;
    let check = task.check.as_ref();
    patch.insert(format!("{entry}/{checked}"), json!(task.is_checked()));
    patch.insert(format!("{entry}/{by}"), json!(check.map(|c| c.by.as_str())));
    patch.insert(
        format!("{entry}/{by_name}"),
        json!(check.and_then(|c| c.by_name.as_deref())),
    );
    patch.insert(
        format!("{entry}/{at}"),
        json!(check.map(|c| c.at.timestamp_millis())),
    );
}

// ---------------------------------------------------------------------------
// Defect flag and assignment
// ---------------------------------------------------------------------------

/// Plan flagging a stage as defective. Reporting again replaces the report.
///
/// # Errors
///
/// Returns [`TrackError::NotFound`] for an unknown stage.
pub fn plan_report_defect(
    graph: &ProcessGraph,
    stage_id: &str,
    actor: &MemberRef,
    note: Option<String>,
    at: DateTime<Utc>,
) -> Result<Mutation, TrackError> {
    let (index, stage) = find_stage(graph, stage_id)?;
    let defect = Defect {
        reported_by: actor.clone(),
        reported_at: at,
        note,
    };
    if stage.defect.as_ref() == Some(&defect) {
        return Ok(Mutation::unchanged(graph, index));
    }

    let stored = StoredDefect {
        reported_by: actor.as_str().to_string(),
        reported_at: Some(at.timestamp_millis()),
        note: defect.note.clone(),
    };
    let mut after = graph.clone();
    after.stages[index].defect = Some(defect);
    after.stages[index].updated_at = Some(at);

    let base = stage_base(stage);
    let mut patch = Patch::new();
    patch.insert(format!("{base}/{}", field::DEFECT), json!(stored));
    patch.insert(format!("{base}/{}", field::UPDATED_AT), json!(at.timestamp_millis()));

    Ok(Mutation {
        patch: Some(patch),
        before: graph.clone(),
        after,
        stage_index: index,
    })
}

/// Plan clearing a stage's defect flag; clearing an absent flag is a no-op.
///
/// # Errors
///
/// Returns [`TrackError::NotFound`] for an unknown stage.
pub fn plan_resolve_defect(
    graph: &ProcessGraph,
    stage_id: &str,
    at: DateTime<Utc>,
) -> Result<Mutation, TrackError> {
    let (index, stage) = find_stage(graph, stage_id)?;
    if stage.defect.is_none() {
        return Ok(Mutation::unchanged(graph, index));
    }

    let mut after = graph.clone();
    after.stages[index].defect = None;
    after.stages[index].updated_at = Some(at);

    let base = stage_base(stage);
    let mut patch = Patch::new();
    patch.insert(format!("{base}/{}", field::DEFECT), Value::Null);
    patch.insert(format!("{base}/{}", field::UPDATED_AT), json!(at.timestamp_millis()));

    Ok(Mutation {
        patch: Some(patch),
        before: graph.clone(),
        after,
        stage_index: index,
    })
}

/// Plan replacing a stage's assigned member set.
///
/// # Errors
///
/// Returns [`TrackError::NotFound`] for an unknown stage.
pub fn plan_assign_members(
    graph: &ProcessGraph,
    stage_id: &str,
    members: BTreeSet<MemberRef>,
    at: DateTime<Utc>,
) -> Result<Mutation, TrackError> {
    let (index, stage) = find_stage(graph, stage_id)?;
    if stage.assigned_members == members {
        return Ok(Mutation::unchanged(graph, index));
    }

    let stored: Vec<&str> = members.iter().map(MemberRef::as_str).collect();
    let key = if stage.is_legacy() {
        field::MEMBERS
    } else {
        field::ASSIGNED_MEMBERS
    };
    let base = stage_base(stage);
    let mut patch = Patch::new();
    patch.insert(format!("{base}/{key}"), json!(stored));
    patch.insert(format!("{base}/{}", field::UPDATED_AT), json!(at.timestamp_millis()));

    let mut after = graph.clone();
    after.stages[index].assigned_members = members;
    after.stages[index].updated_at = Some(at);

    Ok(Mutation {
        patch: Some(patch),
        before: graph.clone(),
        after,
        stage_index: index,
    })
}

// ---------------------------------------------------------------------------
// Ordinal backfill
// ---------------------------------------------------------------------------

/// Patch pinning every legacy stage's `order` to its current position, or
/// `None` when every legacy stage already carries an explicit ordinal.
#[must_use]
pub fn ordinal_backfill(graph: &ProcessGraph) -> Option<Patch> {
    graph.implicit_ordinals().next()?;

    let mut patch = Patch::new();
    for stage in &graph.stages {
        if let StageOrigin::Legacy { workflow_key, .. } = &stage.origin {
            patch.insert(
                format!("{}/{workflow_key}/{}", field::WORKFLOWS, field::ORDER),
                json!(stage.ordinal),
            );
        }
    }
    Some(patch)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_stage<'a>(graph: &'a ProcessGraph, stage_id: &str) -> Result<(usize, &'a Stage), TrackError> {
    graph
        .stage(stage_id)
        .ok_or_else(|| TrackError::not_found(NotFoundKind::Stage, stage_id))
}

fn ensure_unlockable(graph: &ProcessGraph, report: &GateReport, index: usize) -> Result<(), TrackError> {
    if report.at(index).is_some_and(|g| g.unlockable) {
        return Ok(());
    }

    let stage = &graph.stages[index];
    let blocker = report
        .blocker_of(index)
        .and_then(|g| graph.stage(&g.stage_id))
        .map(|(_, s)| s)
        .or_else(|| index.checked_sub(1).and_then(|prev| graph.stages.get(prev)));

    Err(TrackError::StageLocked {
        stage: stage.id.clone(),
        stage_name: stage.display_name(),
        blocked_by: blocker.map_or_else(String::new, |s| s.id.clone()),
        blocked_by_name: blocker.map_or_else(String::new, Stage::display_name),
    })
}

/// Stage record path relative to the product record.
fn stage_base(stage: &Stage) -> String {
    match &stage.origin {
        StageOrigin::Legacy { workflow_key, .. } => format!("{}/{workflow_key}", field::WORKFLOWS),
        StageOrigin::Instance {
            instance_key,
            stage_key,
        } => format!(
            "{}/{instance_key}/{}/{stage_key}",
            field::PROCESS_INSTANCES,
            field::STAGES
        ),
    }
}
