//! Read and mutate product processes against a [`DocumentStore`].
//!
//! Every mutation re-reads the product record immediately before planning,
//! so the gate is checked against current state rather than whatever the
//! caller last displayed. Two writers can still interleave between that read
//! and the write; the next read re-derives everything, and the store applies
//! each patch atomically.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::directory::Directory;
use crate::error::{NotFoundKind, TrackError};
use crate::gate;
use crate::model::{MemberRef, OwnerRef, ProcessGraph, StageOrigin};
use crate::mutate::{self, Mutation, MutationOutcome, ToggleRequest};
use crate::normalize::normalize;
use crate::progress;
use crate::store::{DocPath, DocumentStore, StoreError};
use crate::view::{self, TrackingView};

/// Collection holding products under an owner record.
pub const PRODUCTS: &str = "products";

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Process tracking over one store root.
pub struct Tracker<S> {
    store: S,
    root: DocPath,
    backfill_ordinals: bool,
    clock: Clock,
}

impl<S> fmt::Debug for Tracker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("root", &self.root)
            .field("backfill_ordinals", &self.backfill_ordinals)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore> Tracker<S> {
    pub fn new(store: S, root: DocPath) -> Self {
        Self {
            store,
            root,
            backfill_ordinals: true,
            clock: Box::new(Utc::now),
        }
    }

    /// Build from project config.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] if the configured root is not a
    /// valid path.
    pub fn from_config(store: S, config: &ProjectConfig) -> Result<Self, StoreError> {
        let root = DocPath::parse(&config.store.root)?;
        Ok(Self::new(store, root).with_backfill(config.process.backfill_ordinals))
    }

    #[must_use]
    pub fn with_backfill(mut self, enabled: bool) -> Self {
        self.backfill_ordinals = enabled;
        self
    }

    /// Replace the timestamp source used for `checkedAt`/`updatedAt`.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn root(&self) -> &DocPath {
        &self.root
    }

    /// `{root}/{orders|warranty_claims}/{code}`
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Store`] if the code is not a valid path key.
    pub fn owner_path(&self, owner: &OwnerRef) -> Result<DocPath, TrackError> {
        Ok(self
            .root
            .child(owner.kind.collection())?
            .child(&owner.code)?)
    }

    /// `{root}/{collection}/{code}/products/{product_id}`
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Store`] if a key is not a valid path key.
    pub fn product_path(&self, owner: &OwnerRef, product_id: &str) -> Result<DocPath, TrackError> {
        Ok(self.owner_path(owner)?.child(PRODUCTS)?.child(product_id)?)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn read_graph(
        &self,
        owner: &OwnerRef,
        product_id: &str,
        path: &DocPath,
    ) -> Result<ProcessGraph, TrackError> {
        let product = self
            .store
            .read(path)?
            .ok_or_else(|| TrackError::not_found(NotFoundKind::Product, product_id))?;
        Ok(normalize(owner, product_id, &product)?)
    }

    /// Read and normalize a product's process.
    ///
    /// Legacy stages without an explicit ordinal get one written back when
    /// backfill is enabled; a failed backfill is logged and does not fail
    /// the read.
    ///
    /// # Errors
    ///
    /// - [`TrackError::NotFound`] if the product record does not exist.
    /// - [`TrackError::MalformedRecord`] if it matches neither stored shape.
    /// - [`TrackError::TransientIo`] if the store is unreachable.
    pub fn load_process(&self, owner: &OwnerRef, product_id: &str) -> Result<ProcessGraph, TrackError> {
        let path = self.product_path(owner, product_id)?;
        let mut graph = self.read_graph(owner, product_id, &path)?;

        if !self.backfill_ordinals {
            return Ok(graph);
        }

        if let Some(patch) = mutate::ordinal_backfill(&graph) {
            match self.store.update(&path, &patch) {
                Ok(()) => {
                    info!(
                        owner = %owner,
                        product = product_id,
                        stages = patch.len(),
                        "backfilled legacy stage ordinals"
                    );
                    for stage in &mut graph.stages {
                        if let StageOrigin::Legacy { explicit_order, .. } = &mut stage.origin {
                            *explicit_order = true;
                        }
                    }
                }
                Err(err) => warn!(
                    owner = %owner,
                    product = product_id,
                    error = %err,
                    "could not backfill legacy stage ordinals"
                ),
            }
        }

        Ok(graph)
    }

    /// Like [`Tracker::load_process`], but a malformed record degrades to an
    /// empty process.
    ///
    /// # Errors
    ///
    /// Returns every [`TrackError`] except `MalformedRecord`.
    pub fn load_process_or_empty(
        &self,
        owner: &OwnerRef,
        product_id: &str,
    ) -> Result<ProcessGraph, TrackError> {
        match self.load_process(owner, product_id) {
            Err(TrackError::MalformedRecord(err)) => {
                warn!(
                    owner = %owner,
                    product = product_id,
                    path = %err.path,
                    reason = %err.reason,
                    "malformed product record; showing it without a process"
                );
                Ok(ProcessGraph::empty(owner.clone(), product_id))
            }
            other => other,
        }
    }

    /// Graph, gates, progress and resolved names in one read.
    ///
    /// # Errors
    ///
    /// See [`Tracker::load_process_or_empty`]. The directory never fails
    /// the view.
    pub fn tracking_view(&self, owner: &OwnerRef, product_id: &str) -> Result<TrackingView, TrackError> {
        let graph = self.load_process_or_empty(owner, product_id)?;
        let report = gate::evaluate(&graph);
        let summary = progress::summarize(&graph, &report);
        let directory = Directory::load_or_default(&self.store, &self.root);
        Ok(view::build(&graph, &report, summary, &directory))
    }

    /// Product ids registered under an owner record, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::TransientIo`] if the store is unreachable.
    pub fn list_products(&self, owner: &OwnerRef) -> Result<Vec<String>, TrackError> {
        let path = self.owner_path(owner)?.child(PRODUCTS)?;
        let products = self.store.read(&path)?;
        Ok(match products {
            Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(index, _)| index.to_string())
                .collect(),
            _ => Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Check or uncheck one task.
    ///
    /// # Errors
    ///
    /// - [`TrackError::StageLocked`] if the stage is not unlockable; nothing
    ///   is written.
    /// - [`TrackError::NotFound`] for an unknown product, stage or task.
    /// - [`TrackError::MalformedRecord`] if the product cannot be normalized.
    /// - [`TrackError::TransientIo`] if the store is unreachable.
    pub fn toggle_task(
        &self,
        owner: &OwnerRef,
        product_id: &str,
        stage_id: &str,
        task_id: &str,
        checked: bool,
        actor: &MemberRef,
    ) -> Result<MutationOutcome, TrackError> {
        let path = self.product_path(owner, product_id)?;
        let graph = self.read_graph(owner, product_id, &path)?;

        let actor_name = checked.then(|| {
            Directory::load_or_default(&self.store, &self.root).member_name(actor)
        });
        let request = ToggleRequest {
            stage_id: stage_id.to_string(),
            task_id: task_id.to_string(),
            checked,
            actor: actor.clone(),
            actor_name,
            at: (self.clock)(),
        };

        let mutation = mutate::plan_toggle(&graph, &request).inspect_err(|err| {
            if err.is_rejection() {
                info!(
                    owner = %owner,
                    product = product_id,
                    stage = stage_id,
                    task = task_id,
                    error = %err,
                    "toggle rejected"
                );
            }
        })?;

        self.commit(owner, product_id, &path, &mutation, "task toggled")?;
        Ok(mutation.outcome())
    }

    /// Flag a stage as defective.
    ///
    /// # Errors
    ///
    /// See [`Tracker::toggle_task`]; defect reports are not gated.
    pub fn report_defect(
        &self,
        owner: &OwnerRef,
        product_id: &str,
        stage_id: &str,
        actor: &MemberRef,
        note: Option<String>,
    ) -> Result<MutationOutcome, TrackError> {
        let path = self.product_path(owner, product_id)?;
        let graph = self.read_graph(owner, product_id, &path)?;
        let mutation = mutate::plan_report_defect(&graph, stage_id, actor, note, (self.clock)())?;
        self.commit(owner, product_id, &path, &mutation, "defect reported")?;
        Ok(mutation.outcome())
    }

    /// Clear a stage's defect flag.
    ///
    /// # Errors
    ///
    /// See [`Tracker::toggle_task`].
    pub fn resolve_defect(
        &self,
        owner: &OwnerRef,
        product_id: &str,
        stage_id: &str,
        actor: &MemberRef,
    ) -> Result<MutationOutcome, TrackError> {
        let path = self.product_path(owner, product_id)?;
        let graph = self.read_graph(owner, product_id, &path)?;
        let mutation = mutate::plan_resolve_defect(&graph, stage_id, (self.clock)())?;
        debug!(actor = %actor, stage = stage_id, "resolving defect");
        self.commit(owner, product_id, &path, &mutation, "defect resolved")?;
        Ok(mutation.outcome())
    }

    /// Replace the members assigned to a stage.
    ///
    /// # Errors
    ///
    /// See [`Tracker::toggle_task`]; assignment is not gated.
    pub fn assign_members(
        &self,
        owner: &OwnerRef,
        product_id: &str,
        stage_id: &str,
        members: BTreeSet<MemberRef>,
    ) -> Result<MutationOutcome, TrackError> {
        let path = self.product_path(owner, product_id)?;
        let graph = self.read_graph(owner, product_id, &path)?;
        let mutation = mutate::plan_assign_members(&graph, stage_id, members, (self.clock)())?;
        self.commit(owner, product_id, &path, &mutation, "members assigned")?;
        Ok(mutation.outcome())
    }

    fn commit(
        &self,
        owner: &OwnerRef,
        product_id: &str,
        path: &DocPath,
        mutation: &Mutation,
        what: &'static str,
    ) -> Result<(), TrackError> {
        let stage = &mutation.after.stages[mutation.stage_index].id;
        let Some(patch) = &mutation.patch else {
            debug!(owner = %owner, product = product_id, stage = %stage, "{what}: already in requested state");
            return Ok(());
        };

        self.store.update(path, patch)?;
        info!(
            owner = %owner,
            product = product_id,
            stage = %stage,
            fields = patch.len(),
            "{what}"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StageStatus;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn fixed_clock() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    fn tracker(product: serde_json::Value) -> Tracker<MemoryStore> {
        let store = MemoryStore::with_root(json!({"xoxo": {
            "orders": {"DH001": {"code": "DH001", "products": {"p1": product}}},
            "members": {"mem_01": {"name": "Lan"}}
        }}));
        Tracker::new(store, DocPath::parse("xoxo").unwrap()).with_clock(fixed_clock)
    }

    fn owner() -> OwnerRef {
        OwnerRef::order("DH001")
    }

    #[test]
    fn toggle_writes_through_and_rereads() {
        let tracker = tracker(json!({"workflows": {
            "wf_0": {"workflowName": ["Cắt"], "order": 0},
            "wf_1": {"workflowName": ["May"], "order": 1}
        }}));
        let actor = MemberRef::new("mem_01");

        let outcome = tracker
            .toggle_task(&owner(), "p1", "wf_0", "task_wf_0_0", true, &actor)
            .unwrap();
        assert!(outcome.written);
        assert_eq!(outcome.stage_status, StageStatus::Finish);
        assert!(outcome.next_unlocked);
        assert_eq!(outcome.progress.percent, 50);

        let stored = tracker
            .store()
            .read(&DocPath::parse("xoxo/orders/DH001/products/p1/workflows/wf_0").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored["isDone"], json!(true));
        assert_eq!(stored["checklist"][0]["checkedByName"], json!("Lan"));

        let graph = tracker.load_process(&owner(), "p1").unwrap();
        let check = graph.stages[0].tasks[0].check.clone().unwrap();
        assert_eq!(check.by, actor);
        assert_eq!(check.at, fixed_clock());
    }

    #[test]
    fn missing_product_is_not_found() {
        let tracker = tracker(json!({"workflows": {}}));
        let err = tracker.load_process(&owner(), "p404").unwrap_err();
        assert!(matches!(
            err,
            TrackError::NotFound {
                kind: NotFoundKind::Product,
                ..
            }
        ));
    }

    #[test]
    fn malformed_record_degrades_to_empty_graph() {
        let tracker = tracker(json!({"workflows": {"wf": {"isDone": true}}}));
        assert!(matches!(
            tracker.load_process(&owner(), "p1"),
            Err(TrackError::MalformedRecord(_))
        ));
        let graph = tracker.load_process_or_empty(&owner(), "p1").unwrap();
        assert!(graph.is_empty());

        let view = tracker.tracking_view(&owner(), "p1").unwrap();
        assert_eq!(view.progress.percent, 0);
        assert!(view.progress.current_stage.is_none());
    }

    #[test]
    fn load_backfills_implicit_ordinals_once() {
        let tracker = tracker(json!({"workflows": {
            "wf_b": {"workflowName": ["May"]},
            "wf_a": {"workflowName": ["Cắt"]}
        }}));
        let graph = tracker.load_process(&owner(), "p1").unwrap();
        assert_eq!(graph.implicit_ordinals().count(), 0);
        assert_eq!(tracker.store().write_count(), 1);

        let order = tracker
            .store()
            .read(&DocPath::parse("xoxo/orders/DH001/products/p1/workflows/wf_b/order").unwrap())
            .unwrap();
        assert_eq!(order, Some(json!(graph.stage("wf_b").unwrap().0)));

        tracker.load_process(&owner(), "p1").unwrap();
        assert_eq!(tracker.store().write_count(), 1);
    }

    #[test]
    fn backfill_can_be_disabled() {
        let tracker = tracker(json!({"workflows": {"wf": {"workflowName": ["Cắt"]}}}))
            .with_backfill(false);
        let graph = tracker.load_process(&owner(), "p1").unwrap();
        assert_eq!(graph.implicit_ordinals().count(), 1);
        assert_eq!(tracker.store().write_count(), 0);
    }

    #[test]
    fn offline_store_is_transient() {
        let tracker = tracker(json!({"workflows": {"wf": {"workflowName": ["Cắt"]}}}));
        tracker.store().set_offline(true);
        let err = tracker
            .toggle_task(&owner(), "p1", "wf", "task_wf_0", true, &MemberRef::new("m"))
            .unwrap_err();
        assert!(matches!(err, TrackError::TransientIo(_)));
        assert!(!err.is_rejection());
    }

    #[test]
    fn list_products_reads_owner_record() {
        let tracker = tracker(json!({"workflows": {}}));
        assert_eq!(tracker.list_products(&owner()).unwrap(), vec!["p1"]);
        assert!(tracker
            .list_products(&OwnerRef::warranty_claim("BH404"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn product_path_follows_owner_kind() {
        let tracker = tracker(json!({}));
        assert_eq!(
            tracker
                .product_path(&OwnerRef::warranty_claim("BH01"), "p9")
                .unwrap()
                .to_string(),
            "xoxo/warranty_claims/BH01/products/p9"
        );
        assert!(tracker.product_path(&owner(), "bad.id").is_err());
    }
}
