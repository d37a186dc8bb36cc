//! Process normalizer: stored product record → canonical [`ProcessGraph`].
//!
//! Both historical shapes collapse into the same `Stage`/`Task` form here.
//!
//! # Ordering
//!
//! Stage order follows the explicit ordinal carried by each stage
//! (`order` on legacy workflows, `processOrder`/`stageOrder` on instances).
//! When a legacy workflow has no ordinal, its position in store iteration
//! order stands in for it and the stage is marked `explicit_order: false` so
//! the caller can backfill one (see [`ProcessGraph::implicit_ordinals`]).
//! Ties keep store order. Tasks sort by `(order_in_stage, id)`.
//!
//! # Legacy checklists
//!
//! A legacy workflow without a stored checklist gets one task per name, all
//! unchecked. The stage-level `isDone` flag is not carried onto those tasks,
//! so a legacy stage that was marked done before checklists existed reads as
//! 0% until someone checks its tasks.
//!
//! # Attribution repair
//!
//! Stored tasks do not always honour the check/attribution invariant. An
//! unchecked task drops any leftover `checkedBy`/`checkedAt`; a checked task
//! missing them gets [`MemberRef::unknown`] and the stage's `updatedAt` (or
//! the epoch) so that `check` is always all-or-nothing in memory.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::model::{
    ChecklistSource, DepartmentRef, Defect, MemberRef, OwnerRef, ProcessGraph, ProcessShape,
    Stage, StageOrigin, Task, TaskCheck,
};
use crate::record::instance::{ProcessInstance, StageInstance};
use crate::record::legacy::{LegacyWorkflow, synthesized_task_id};
use crate::record::{MalformedRecord, StoredDefect, StoredProcess, classify, field};

/// Convert epoch milliseconds into a UTC timestamp.
#[must_use]
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// Normalize a stored product record into a canonical [`ProcessGraph`].
///
/// # Errors
///
/// Returns [`MalformedRecord`] if the record matches neither stored shape or
/// a stage carries two tasks with the same id.
pub fn normalize(
    owner: &OwnerRef,
    product_id: &str,
    product: &Value,
) -> Result<ProcessGraph, MalformedRecord> {
    let (shape, stages) = match classify(product)? {
        StoredProcess::Empty => (ProcessShape::Empty, Vec::new()),
        StoredProcess::Legacy(workflows) => (ProcessShape::Legacy, legacy_stages(workflows)?),
        StoredProcess::Instance(instances) => {
            (ProcessShape::Instance, instance_stages(instances)?)
        }
    };

    let mut graph = ProcessGraph {
        owner: owner.clone(),
        product_id: product_id.to_string(),
        shape,
        stages,
    };
    for (ordinal, stage) in graph.stages.iter_mut().enumerate() {
        stage.ordinal = ordinal;
    }

    debug!(
        owner = %owner,
        product = product_id,
        shape = ?graph.shape,
        stages = graph.len(),
        "normalized process"
    );
    Ok(graph)
}

// ---------------------------------------------------------------------------
// Legacy shape
// ---------------------------------------------------------------------------

fn legacy_stages(
    workflows: Vec<(String, LegacyWorkflow)>,
) -> Result<Vec<Stage>, MalformedRecord> {
    let mut keyed: Vec<(i64, Stage)> = Vec::with_capacity(workflows.len());

    for (position, (key, workflow)) in workflows.into_iter().enumerate() {
        let position = position_key(position);
        let sort_key = workflow.order.unwrap_or(position);
        let stage = legacy_stage(key, workflow)?;
        keyed.push((sort_key, stage));
    }

    keyed.sort_by_key(|(sort_key, _)| *sort_key);
    Ok(keyed.into_iter().map(|(_, stage)| stage).collect())
}

fn legacy_stage(key: String, workflow: LegacyWorkflow) -> Result<Stage, MalformedRecord> {
    let updated_at = workflow.updated_at.and_then(from_millis);

    let (tasks, checklist) = match workflow.checklist {
        Some(stored) => {
            let mut tasks = Vec::with_capacity(stored.len());
            for (position, (slot, entry)) in stored.into_entries().into_iter().enumerate() {
                let index = position_key(position);
                tasks.push(Task {
                    id: entry
                        .id
                        .unwrap_or_else(|| synthesized_task_id(&key, position)),
                    order_in_stage: entry.task_order.unwrap_or(index + 1),
                    name: entry.task_name,
                    check: canonical_check(
                        entry.checked,
                        entry.checked_by,
                        entry.checked_by_name,
                        entry.checked_at,
                        updated_at,
                    ),
                    notes: entry.notes,
                    slot,
                });
            }
            (tasks, ChecklistSource::Stored)
        }
        None => {
            if workflow.is_done {
                debug!(
                    workflow = %key,
                    "legacy isDone is not carried onto a synthesized checklist"
                );
            }
            let tasks = workflow
                .workflow_name
                .iter()
                .enumerate()
                .map(|(index, name)| Task {
                    id: synthesized_task_id(&key, index),
                    order_in_stage: position_key(index) + 1,
                    name: name.clone(),
                    check: None,
                    notes: None,
                    slot: index.to_string(),
                })
                .collect();
            (tasks, ChecklistSource::Synthesized)
        }
    };

    let tasks = sorted_tasks(tasks, &format!("{}/{key}", field::WORKFLOWS))?;

    Ok(Stage {
        id: key.clone(),
        ordinal: 0,
        names: workflow.workflow_name,
        department: workflow.department_code.map(DepartmentRef::new),
        assigned_members: workflow.members.into_iter().map(MemberRef::new).collect(),
        tasks,
        defect: workflow.defect.map(canonical_defect),
        updated_at,
        origin: StageOrigin::Legacy {
            workflow_key: key,
            checklist,
            explicit_order: workflow.order.is_some(),
        },
    })
}

// ---------------------------------------------------------------------------
// Process-instance shape
// ---------------------------------------------------------------------------

fn instance_stages(
    instances: Vec<(String, ProcessInstance)>,
) -> Result<Vec<Stage>, MalformedRecord> {
    let mut ordered: Vec<(i64, String, ProcessInstance)> = instances
        .into_iter()
        .enumerate()
        .map(|(position, (key, instance))| {
            let sort_key = instance.process_order.unwrap_or(position_key(position));
            (sort_key, key, instance)
        })
        .collect();
    ordered.sort_by_key(|(sort_key, _, _)| *sort_key);

    let mut stages = Vec::new();
    for (_, instance_key, instance) in ordered {
        let mut inner: Vec<(i64, String, StageInstance)> = instance
            .stages
            .into_entries()
            .into_iter()
            .enumerate()
            .map(|(position, (key, stage))| {
                let sort_key = stage.stage_order.unwrap_or(position_key(position));
                (sort_key, key, stage)
            })
            .collect();
        inner.sort_by_key(|(sort_key, _, _)| *sort_key);

        for (_, stage_key, stage) in inner {
            stages.push(instance_stage(&instance_key, stage_key, stage)?);
        }
    }
    Ok(stages)
}

fn instance_stage(
    instance_key: &str,
    stage_key: String,
    stage: StageInstance,
) -> Result<Stage, MalformedRecord> {
    let updated_at = stage.updated_at.and_then(from_millis);

    let tasks = stage
        .tasks
        .into_entries()
        .into_iter()
        .enumerate()
        .map(|(position, (slot, task))| Task {
            id: task.task_id.unwrap_or_else(|| slot.clone()),
            order_in_stage: task.task_order.unwrap_or(position_key(position) + 1),
            name: task.name,
            check: canonical_check(
                task.checked,
                task.checked_by,
                task.checked_by_name,
                task.checked_at,
                updated_at,
            ),
            notes: task.notes,
            slot,
        })
        .collect();
    let tasks = sorted_tasks(
        tasks,
        &format!(
            "{}/{instance_key}/{}/{stage_key}",
            field::PROCESS_INSTANCES,
            field::STAGES
        ),
    )?;

    Ok(Stage {
        id: instance_stage_id(instance_key, &stage_key),
        ordinal: 0,
        names: vec![stage.name],
        department: stage.department_code.map(DepartmentRef::new),
        assigned_members: stage
            .assigned_members
            .into_iter()
            .map(MemberRef::new)
            .collect::<BTreeSet<_>>(),
        tasks,
        defect: stage.defect.map(canonical_defect),
        updated_at,
        origin: StageOrigin::Instance {
            instance_key: instance_key.to_string(),
            stage_key,
        },
    })
}

/// Canonical id of an instance stage: `{instanceKey}:{stageKey}`.
#[must_use]
pub fn instance_stage_id(instance_key: &str, stage_key: &str) -> String {
    format!("{instance_key}:{stage_key}")
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn position_key(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

fn sorted_tasks(mut tasks: Vec<Task>, stage_path: &str) -> Result<Vec<Task>, MalformedRecord> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in &tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(MalformedRecord::new(
                stage_path,
                format!("duplicate task id '{}'", task.id),
            ));
        }
    }
    tasks.sort_by(|a, b| {
        a.order_in_stage
            .cmp(&b.order_in_stage)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(tasks)
}

fn canonical_check(
    checked: bool,
    by: Option<String>,
    by_name: Option<String>,
    at: Option<i64>,
    fallback_at: Option<DateTime<Utc>>,
) -> Option<TaskCheck> {
    if !checked {
        if by.is_some() || at.is_some() {
            debug!("dropping attribution left on an unchecked task");
        }
        return None;
    }

    if by.is_none() || at.is_none() {
        debug!("repairing checked task with missing attribution");
    }

    Some(TaskCheck {
        by: by.map_or_else(MemberRef::unknown, MemberRef::new),
        by_name,
        at: at
            .and_then(from_millis)
            .or(fallback_at)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

fn canonical_defect(stored: StoredDefect) -> Defect {
    Defect {
        reported_by: MemberRef::new(stored.reported_by),
        reported_at: stored
            .reported_at
            .and_then(from_millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        note: stored.note,
    }
}
