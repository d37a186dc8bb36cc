use proptest::prelude::*;
use stagegate_core::TrackError;
use stagegate_core::gate::evaluate;
use stagegate_core::model::{MemberRef, OwnerRef, StageStatus};
use stagegate_core::progress::summarize;

use generators::*;

fn owner() -> OwnerRef {
    OwnerRef::order("DH001")
}

fn actor() -> MemberRef {
    MemberRef::new("mem_01")
}

fn both_shapes(stages: &[StagePlan]) -> [serde_json::Value; 2] {
    [legacy_product(stages), instance_product(stages)]
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn stage_unlockable_iff_all_predecessors_finished(stages in arb_stages()) {
        for product in both_shapes(&stages) {
            let tracker = seeded_tracker(product);
            let graph = tracker.load_process(&owner(), "p1").unwrap();
            let report = evaluate(&graph);

            prop_assert_eq!(report.stages.len(), stages.len());
            for i in 0..report.stages.len() {
                let all_before_finished = report.stages[..i]
                    .iter()
                    .all(|g| g.status == StageStatus::Finish);
                prop_assert_eq!(report.stages[i].unlockable, all_before_finished);
            }
        }
    }

    #[test]
    fn checking_never_lowers_and_unchecking_never_raises_completion(
        stages in arb_stages(),
        pick in any::<prop::sample::Index>(),
    ) {
        for product in both_shapes(&stages) {
            let tracker = seeded_tracker(product.clone());
            let graph = tracker.load_process(&owner(), "p1").unwrap();
            let report = evaluate(&graph);

            let candidates: Vec<(usize, String)> = graph
                .stages
                .iter()
                .enumerate()
                .filter(|(i, _)| report.stages[*i].unlockable)
                .flat_map(|(i, stage)| {
                    stage
                        .tasks
                        .iter()
                        .filter(|t| !t.is_checked())
                        .map(move |t| (i, t.id.clone()))
                })
                .collect();
            if candidates.is_empty() {
                continue;
            }
            let (index, task) = candidates[pick.index(candidates.len())].clone();
            let stage = stage_id(&product, index);
            let before = summarize(&graph, &report).percent;

            let checked = tracker
                .toggle_task(&owner(), "p1", &stage, &task, true, &actor())
                .unwrap();
            prop_assert!(checked.written);
            prop_assert!(checked.progress.percent >= before);

            let unchecked = tracker
                .toggle_task(&owner(), "p1", &stage, &task, false, &actor())
                .unwrap();
            prop_assert!(unchecked.progress.percent <= checked.progress.percent);
            prop_assert_eq!(unchecked.progress.percent, before);
        }
    }

    #[test]
    fn rechecking_keeps_attribution_and_writes_nothing(
        stages in arb_stages(),
        pick in any::<prop::sample::Index>(),
    ) {
        for product in both_shapes(&stages) {
            let tracker = seeded_tracker(product.clone());
            let graph = tracker.load_process(&owner(), "p1").unwrap();
            let report = evaluate(&graph);

            let checked: Vec<(usize, String)> = graph
                .stages
                .iter()
                .enumerate()
                .filter(|(i, _)| report.stages[*i].unlockable)
                .flat_map(|(i, stage)| {
                    stage
                        .tasks
                        .iter()
                        .filter(|t| t.is_checked())
                        .map(move |t| (i, t.id.clone()))
                })
                .collect();
            if checked.is_empty() {
                continue;
            }
            let (index, task) = checked[pick.index(checked.len())].clone();
            let snapshot = tracker.store().snapshot().unwrap();

            let outcome = tracker
                .toggle_task(&owner(), "p1", &stage_id(&product, index), &task, true, &actor())
                .unwrap();
            prop_assert!(!outcome.written);
            prop_assert_eq!(tracker.store().snapshot().unwrap(), snapshot);

            let graph = tracker.load_process(&owner(), "p1").unwrap();
            let check = graph.stages[index].task(&task).unwrap().check.clone().unwrap();
            prop_assert_eq!(check.by.as_str(), "mem_seed");
            prop_assert_eq!(check.at.timestamp_millis(), 500);
        }
    }

    #[test]
    fn locked_stage_rejects_and_leaves_store_untouched(
        stages in arb_stages(),
        pick in any::<prop::sample::Index>(),
        target in any::<bool>(),
    ) {
        for product in both_shapes(&stages) {
            let tracker = seeded_tracker(product.clone());
            let graph = tracker.load_process(&owner(), "p1").unwrap();
            let report = evaluate(&graph);

            let locked: Vec<(usize, String)> = graph
                .stages
                .iter()
                .enumerate()
                .filter(|(i, _)| !report.stages[*i].unlockable)
                .flat_map(|(i, stage)| stage.tasks.iter().map(move |t| (i, t.id.clone())))
                .collect();
            if locked.is_empty() {
                continue;
            }
            let (index, task) = locked[pick.index(locked.len())].clone();
            let before = serde_json::to_vec(&tracker.store().snapshot().unwrap()).unwrap();

            let err = tracker
                .toggle_task(&owner(), "p1", &stage_id(&product, index), &task, target, &actor())
                .unwrap_err();
            let is_locked = matches!(err, TrackError::StageLocked { .. });
            prop_assert!(is_locked);
            prop_assert!(err.is_rejection());

            let after = serde_json::to_vec(&tracker.store().snapshot().unwrap()).unwrap();
            prop_assert_eq!(before, after);
            prop_assert_eq!(tracker.store().write_count(), 0);
        }
    }
}
