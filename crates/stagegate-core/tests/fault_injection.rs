use serde_json::json;
use stagegate_core::model::{MemberRef, OwnerRef};
use stagegate_core::{ErrorCode, TrackError};

use generators::seeded_tracker;

fn product() -> serde_json::Value {
    json!({"workflows": {
        "wf_0": {"workflowName": ["Cắt"], "order": 0},
        "wf_1": {"workflowName": ["May"], "order": 1}
    }})
}

#[test]
fn unreachable_store_surfaces_transient_error_without_retrying() {
    let tracker = seeded_tracker(product());
    tracker.store().set_offline(true);
    let owner = OwnerRef::order("DH001");

    for result in [
        tracker.load_process(&owner, "p1").map(|_| ()),
        tracker.tracking_view(&owner, "p1").map(|_| ()),
        tracker
            .toggle_task(&owner, "p1", "wf_0", "task_wf_0_0", true, &MemberRef::new("mem_01"))
            .map(|_| ()),
        tracker
            .report_defect(&owner, "p1", "wf_0", &MemberRef::new("mem_qc"), None)
            .map(|_| ()),
    ] {
        let err = result.unwrap_err();
        assert!(matches!(err, TrackError::TransientIo(_)), "got {err:?}");
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert!(!err.is_rejection());
    }
    assert_eq!(tracker.store().write_count(), 0);

    tracker.store().set_offline(false);
    let outcome = tracker
        .toggle_task(&owner, "p1", "wf_0", "task_wf_0_0", true, &MemberRef::new("mem_01"))
        .unwrap();
    assert!(outcome.written);
    assert_eq!(tracker.store().write_count(), 1);
}

#[test]
fn malformed_record_rejects_mutation_but_degrades_reads() {
    let tracker = seeded_tracker(json!({"processInstances": {"proc": {"stages": {"s": {"tasks": []}}}}}));
    let owner = OwnerRef::order("DH001");

    let err = tracker
        .toggle_task(&owner, "p1", "proc:s", "t", true, &MemberRef::new("mem_01"))
        .unwrap_err();
    assert!(matches!(err, TrackError::MalformedRecord(_)));
    assert_eq!(err.code(), ErrorCode::MalformedRecord);

    let view = tracker.tracking_view(&owner, "p1").unwrap();
    assert!(view.stages.is_empty());
}

#[test]
fn unknown_ids_are_rejections() {
    let tracker = seeded_tracker(product());
    let owner = OwnerRef::order("DH001");
    let actor = MemberRef::new("mem_01");

    let missing_product = tracker
        .toggle_task(&owner, "p404", "wf_0", "task_wf_0_0", true, &actor)
        .unwrap_err();
    assert_eq!(missing_product.code(), ErrorCode::ProductNotFound);

    let missing_stage = tracker
        .toggle_task(&owner, "p1", "wf_9", "task_wf_0_0", true, &actor)
        .unwrap_err();
    assert_eq!(missing_stage.code(), ErrorCode::StageNotFound);
    assert!(missing_stage.is_rejection());
}
