//! Canonical domain model: owner/member references and the process graph.

pub mod process;
pub mod refs;

pub use process::{
    ChecklistSource, Defect, ProcessGraph, ProcessShape, Stage, StageOrigin, StageStatus, Task,
    TaskCheck,
};
pub use refs::{DepartmentRef, MemberRef, OwnerKind, OwnerRef};
