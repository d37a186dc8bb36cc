use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use super::refs::{DepartmentRef, MemberRef, OwnerRef};

/// Derived status of a stage. Never stored; recomputed from tasks and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Wait,
    Process,
    Finish,
    Error,
}

impl StageStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::Process => "process",
            Self::Finish => "finish",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "process" => Ok(Self::Process),
            "finish" => Ok(Self::Finish),
            "error" => Ok(Self::Error),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing a [`StageStatus`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stage status: '{0}'")]
pub struct ParseStatusError(pub String);

/// Who checked a task and when. Present exactly when the task is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCheck {
    pub by: MemberRef,
    /// Display name captured at check time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_name: Option<String>,
    pub at: DateTime<Utc>,
}

/// One checklist item within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub order_in_stage: i64,
    pub name: String,
    pub check: Option<TaskCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Entry key of this task inside the stored task collection.
    pub slot: String,
}

impl Task {
    #[must_use]
    pub const fn is_checked(&self) -> bool {
        self.check.is_some()
    }
}

/// Externally asserted defect report on a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    pub reported_by: MemberRef,
    pub reported_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Whether a legacy stage's checklist exists in the store or was made up on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistSource {
    Stored,
    Synthesized,
}

/// Where a canonical stage came from in the stored product record.
///
/// Only the write-back path looks at this; gating and progress ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum StageOrigin {
    Legacy {
        workflow_key: String,
        checklist: ChecklistSource,
        /// `false` when the ordinal came from store iteration order.
        explicit_order: bool,
    },
    Instance {
        instance_key: String,
        stage_key: String,
    },
}

/// One ordered phase of physical processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    /// Dense position in the graph, `0..N`.
    pub ordinal: usize,
    pub names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentRef>,
    pub assigned_members: BTreeSet<MemberRef>,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defect: Option<Defect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub origin: StageOrigin,
}

impl Stage {
    /// Human label; legacy stages may carry several names.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.names.is_empty() {
            return self.id.clone();
        }
        self.names.join(", ")
    }

    #[must_use]
    pub fn checked_count(&self) -> usize {
        self.tasks.iter().filter(|task| task.is_checked()).count()
    }

    /// `true` when the stage has tasks and every one is checked. A stage
    /// without tasks never completes and holds its successors.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(Task::is_checked)
    }

    #[must_use]
    pub const fn is_flagged(&self) -> bool {
        self.defect.is_some()
    }

    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        matches!(self.origin, StageOrigin::Legacy { .. })
    }
}

/// Which stored representation a product record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessShape {
    /// No process registered on the product.
    Empty,
    Legacy,
    Instance,
}

impl ProcessShape {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Legacy => "legacy",
            Self::Instance => "instance",
        }
    }
}

impl fmt::Display for ProcessShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical in-memory form of one product's stage/task sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGraph {
    pub owner: OwnerRef,
    pub product_id: String,
    pub shape: ProcessShape,
    pub stages: Vec<Stage>,
}

impl ProcessGraph {
    /// A graph with zero stages; the degraded form of a malformed record.
    pub fn empty(owner: OwnerRef, product_id: impl Into<String>) -> Self {
        Self {
            owner,
            product_id: product_id.into(),
            shape: ProcessShape::Empty,
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Look up a stage by id, returning its position too.
    #[must_use]
    pub fn stage(&self, stage_id: &str) -> Option<(usize, &Stage)> {
        self.stages
            .iter()
            .enumerate()
            .find(|(_, stage)| stage.id == stage_id)
    }

    /// Legacy stages whose ordinal was inferred from store iteration order.
    pub fn implicit_ordinals(&self) -> impl Iterator<Item = (&str, usize)> {
        self.stages.iter().filter_map(|stage| match &stage.origin {
            StageOrigin::Legacy {
                workflow_key,
                explicit_order: false,
                ..
            } => Some((workflow_key.as_str(), stage.ordinal)),
            _ => None,
        })
    }

    /// Stage ordinals are dense `0..N` in sequence order.
    #[must_use]
    pub fn ordinals_are_dense(&self) -> bool {
        self.stages
            .iter()
            .enumerate()
            .all(|(index, stage)| stage.ordinal == index)
    }
}
