//! Stored product-record shapes and the tagged union they resolve to.
//!
//! A product record carries its process in one of two historical shapes:
//!
//! - [`legacy`] (`workflows`): one workflow per stage with a flat name list
//!   and an optional snake_case checklist.
//! - [`instance`] (`processInstances`): template instances with typed stages
//!   and structured task lists.
//!
//! [`classify`] resolves the shape once per read. Everything downstream of the
//! normalizer sees only the canonical [`ProcessGraph`](crate::model::ProcessGraph).

pub mod instance;
pub mod keyed;
pub mod legacy;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use instance::ProcessInstance;
use keyed::Keyed;
use legacy::LegacyWorkflow;

/// Stored field names shared by both shapes.
pub mod field {
    pub const WORKFLOWS: &str = "workflows";
    pub const PROCESS_INSTANCES: &str = "processInstances";
    pub const STAGES: &str = "stages";
    pub const TASKS: &str = "tasks";
    pub const CHECKLIST: &str = "checklist";
    pub const IS_DONE: &str = "isDone";
    pub const ORDER: &str = "order";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const DEFECT: &str = "defect";
    pub const MEMBERS: &str = "members";
    pub const ASSIGNED_MEMBERS: &str = "assignedMembers";
}

/// Input data matches neither known product shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed record at `{path}`: {reason}")]
pub struct MalformedRecord {
    /// Path of the offending entry, relative to the product record.
    pub path: String,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Defect report as stored on a legacy workflow or an instance stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDefect {
    pub reported_by: String,
    #[serde(default)]
    pub reported_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A product record's process, resolved to exactly one stored shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredProcess {
    /// No process registered on the product.
    Empty,
    Legacy(Vec<(String, LegacyWorkflow)>),
    Instance(Vec<(String, ProcessInstance)>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductEnvelope {
    #[serde(default)]
    workflows: Option<Keyed<Value>>,
    #[serde(default)]
    process_instances: Option<Keyed<Value>>,
}

/// Resolve which shape a stored product record uses and parse its entries.
///
/// `processInstances` wins when both are present; a record with neither has
/// no process and is not an error.
///
/// # Errors
///
/// Returns [`MalformedRecord`] if the record is not an object, a collection
/// has the wrong type, or an entry misses a required key.
pub fn classify(product: &Value) -> Result<StoredProcess, MalformedRecord> {
    if !product.is_object() {
        return Err(MalformedRecord::new("", "product record is not an object"));
    }

    let envelope: ProductEnvelope = serde_json::from_value(product.clone())
        .map_err(|e| MalformedRecord::new("", e.to_string()))?;

    if let Some(instances) = envelope.process_instances {
        let parsed = parse_entries::<ProcessInstance>(field::PROCESS_INSTANCES, instances)?;
        return Ok(StoredProcess::Instance(parsed));
    }

    if let Some(workflows) = envelope.workflows {
        let parsed = parse_entries::<LegacyWorkflow>(field::WORKFLOWS, workflows)?;
        return Ok(StoredProcess::Legacy(parsed));
    }

    Ok(StoredProcess::Empty)
}

fn parse_entries<T: serde::de::DeserializeOwned>(
    collection: &str,
    entries: Keyed<Value>,
) -> Result<Vec<(String, T)>, MalformedRecord> {
    entries
        .into_entries()
        .into_iter()
        .map(|(key, raw)| {
            serde_json::from_value::<T>(raw)
                .map(|parsed| (key.clone(), parsed))
                .map_err(|e| MalformedRecord::new(format!("{collection}/{key}"), e.to_string()))
        })
        .collect()
}
