use super::common::{catalog, draft, draft_in, numbered_drafts};
use crate::workflows::assessment::domain::{
    CategoryCode, CoefficientField, Coefficients, PhaseAssessment, RiskId, TextField,
};
use crate::workflows::assessment::quota::{QuotaGuard, SessionTier};
use crate::workflows::assessment::scoring::{self, RiskLevel, SeverityTier};
use crate::workflows::assessment::store::{CategoryRemoval, RiskEntryStore, StoreError};

fn store_with(count: usize) -> RiskEntryStore {
    let (store, report) = RiskEntryStore::new()
        .add_many(numbered_drafts(count), &QuotaGuard::default(), SessionTier::Free)
        .expect("fixture fits");
    assert_eq!(report.added.len(), count);
    store
}

#[test]
fn added_entries_carry_consistent_scores() {
    let (store, item) = RiskEntryStore::new()
        .add_one(
            draft_in("01", "Exposed wiring", "Electric shock", (6, 6, 15)),
            &QuotaGuard::default(),
            SessionTier::Free,
        )
        .expect("entry added");

    assert_eq!(store.len(), 1);
    assert_eq!(item.risk_no, "01.01");
    assert_eq!(item.current.score(), 540);
    assert_eq!(item.current.level(), RiskLevel::VeryHigh);
    assert_eq!(item.target.score(), scoring::score(1, 6, 15));
    for entry in store.entries() {
        for phase in [&entry.current, &entry.target] {
            assert_eq!(
                phase.score(),
                phase.probability() * phase.frequency() * phase.severity()
            );
            assert_eq!(phase.level(), scoring::classify(phase.score()));
            assert_eq!(phase.color(), phase.level().color_token());
        }
    }
}

#[test]
fn duplicate_pair_is_rejected_and_store_is_unchanged() {
    let quota = QuotaGuard::default();
    let (store, _) = RiskEntryStore::new()
        .add_one(draft("Wet floor", "Slip"), &quota, SessionTier::Free)
        .expect("first add");

    let error = store
        .add_one(draft("Wet floor", "Slip"), &quota, SessionTier::Free)
        .expect_err("duplicate rejected");
    assert_eq!(
        error,
        StoreError::DuplicateEntry {
            hazard: "Wet floor".to_string(),
            risk: "Slip".to_string(),
        }
    );
    assert_eq!(store.len(), 1);

    // Exact match only: a different case is a distinct entry.
    let (store, _) = store
        .add_one(draft("wet floor", "slip"), &quota, SessionTier::Free)
        .expect("case differs");
    assert_eq!(store.len(), 2);
}

#[test]
fn free_quota_admits_the_twentieth_entry_and_rejects_the_next() {
    let quota = QuotaGuard::default();
    let store = store_with(19);

    let (store, _) = store
        .add_one(draft("Twentieth", "Entry"), &quota, SessionTier::Free)
        .expect("twentieth fits");
    assert_eq!(store.len(), 20);

    let error = store
        .add_one(draft("Twenty-first", "Entry"), &quota, SessionTier::Free)
        .expect_err("quota reached");
    assert_eq!(error, StoreError::QuotaExceeded { limit: 20 });
    assert_eq!(store.len(), 20);

    let (store, _) = store
        .add_one(draft("Twenty-first", "Entry"), &quota, SessionTier::Premium)
        .expect("premium is unbounded");
    assert_eq!(store.len(), 21);
}

#[test]
fn oversized_batch_is_rejected_whole_with_remaining_slots() {
    let quota = QuotaGuard::default();
    let store = store_with(17);
    let batch = (0..5)
        .map(|n| draft(&format!("Batch {n}"), "Overflow"))
        .collect();

    let error = store
        .add_many(batch, &quota, SessionTier::Free)
        .expect_err("batch does not fit");
    assert_eq!(
        error,
        StoreError::PartialQuota {
            remaining: 3,
            requested: 5,
        }
    );
    assert_eq!(store.len(), 17);
}

#[test]
fn bulk_add_skips_present_items_and_numbers_without_gaps() {
    let quota = QuotaGuard::default();
    let (store, _) = RiskEntryStore::new()
        .add_one(
            draft_in("02", "Wet floor", "Slip and fall", (6, 6, 3)),
            &quota,
            SessionTier::Free,
        )
        .expect("seed entry");

    let category = vec![
        draft_in("02", "Wet floor", "Slip and fall", (6, 6, 3)),
        draft_in("02", "Cables across walkway", "Trip", (3, 6, 3)),
        draft_in("02", "Uneven stairs", "Fall", (3, 6, 7)),
    ];
    let (store, report) = store
        .add_many(category, &quota, SessionTier::Free)
        .expect("batch fits");

    assert_eq!(report.skipped_duplicates, 1);
    let numbers: Vec<&str> = report.added.iter().map(|item| item.risk_no.as_str()).collect();
    assert_eq!(numbers, vec!["02.02", "02.03"]);
    assert_eq!(store.len(), 3);
}

#[test]
fn batch_repeats_are_matched_loosely_and_first_one_wins() {
    let batch = vec![
        draft("Forklift traffic", "Collision"),
        draft("  forklift   TRAFFIC ", "collision"),
        draft("Noise", "Hearing loss"),
    ];
    let (store, report) = RiskEntryStore::new()
        .add_many(batch, &QuotaGuard::default(), SessionTier::Free)
        .expect("batch fits");

    assert_eq!(report.skipped_duplicates, 1);
    assert_eq!(store.entries()[0].text.hazard, "Forklift traffic");
    assert_eq!(store.entries()[1].risk_no, "99.02");
}

#[test]
fn explicit_risk_numbers_are_kept() {
    let mut numbered = draft("Hot surface", "Burn");
    numbered.risk_no = Some(" 07.15 ".to_string());
    let (_, item) = RiskEntryStore::new()
        .add_one(numbered, &QuotaGuard::default(), SessionTier::Free)
        .expect("entry added");
    assert_eq!(item.risk_no, "07.15");
}

#[test]
fn removals_never_fail_and_ids_are_not_reused() {
    let store = store_with(3);
    let first = store.entries()[0].id;

    let (store, removed) = store.remove(first);
    assert_eq!(removed.map(|item| item.id), Some(first));
    let (store, removed) = store.remove(RiskId(999));
    assert!(removed.is_none());
    assert_eq!(store.len(), 2);

    let (store, outcome) = store.remove_by_category(&CategoryCode::new("01"));
    assert_eq!(outcome, CategoryRemoval::NothingToRemove);
    let (store, outcome) = store.remove_by_category(&CategoryCode::manual());
    assert_eq!(outcome, CategoryRemoval::Removed { count: 2 });
    assert!(store.is_empty());

    let (_, item) = store
        .add_one(draft("Fresh", "Entry"), &QuotaGuard::default(), SessionTier::Free)
        .expect("entry added");
    assert_eq!(item.id, RiskId(4));
}

#[test]
fn clearing_keeps_the_id_counter() {
    let store = store_with(4);
    let (cleared, removed) = store.clear_all_confirmed();
    assert_eq!(removed, 4);
    assert!(cleared.is_empty());
    assert_eq!(cleared.next_id(), store.next_id());
}

#[test]
fn coefficient_edits_clamp_and_rescore() {
    let store = store_with(1);
    let id = store.entries()[0].id;

    let (store, item) = store
        .update_coefficient(id, CoefficientField::Severity, "150")
        .expect("entry exists");
    assert_eq!(item.current.severity(), 100);
    assert_eq!(item.current.score(), 3 * 6 * 100);

    let (store, item) = store
        .update_coefficient(id, CoefficientField::Probability, "")
        .expect("entry exists");
    assert_eq!(item.current.probability(), 0);
    assert_eq!(item.current.score(), 0);
    assert_eq!(item.current.level(), RiskLevel::Acceptable);

    let (store, item) = store
        .finalize_coefficient(id, CoefficientField::Probability)
        .expect("entry exists");
    assert_eq!(item.current.probability(), 1);
    assert_eq!(item.current.score(), 600);

    let (_, item) = store
        .update_coefficient(id, CoefficientField::Frequency2, "12abc")
        .expect("entry exists");
    assert_eq!(item.target.frequency(), 12);
    assert_eq!(item.current.frequency(), 6);
}

#[test]
fn out_of_range_draft_coefficients_are_clamped() {
    let (store, item) = RiskEntryStore::new()
        .add_one(
            draft_in("01", "Exposed wiring", "Electric shock", (4_000_000_000, 2, 1)),
            &QuotaGuard::default(),
            SessionTier::Free,
        )
        .expect("entry added");
    assert_eq!(item.current.probability(), 100);
    assert_eq!(item.current.score(), 200);
    assert_eq!(item.current.level(), scoring::classify(200));

    let mut oversized = draft("Noise", "Hearing loss");
    oversized.target = Coefficients::new(1, 500, 101);
    let (_, item) = store
        .add_one(oversized, &QuotaGuard::default(), SessionTier::Free)
        .expect("entry added");
    assert_eq!(item.target.coefficients(), Coefficients::new(1, 100, 100));
    assert_eq!(item.target.score(), 10_000);
}

#[test]
fn restored_phases_are_clamped_and_rescored() {
    let phase: PhaseAssessment = serde_json::from_value(serde_json::json!({
        "probability": 500,
        "frequency": 2,
        "severity": 1,
        "score": 4_294_967_295u32,
        "level": "very_high"
    }))
    .expect("phase parses");
    assert_eq!(phase.coefficients(), Coefficients::new(100, 2, 1));
    assert_eq!(phase.score(), 200);
    assert_eq!(phase.color(), phase.level().color_token());

    let value = serde_json::to_value(phase).expect("phase serializes");
    assert_eq!(value["score"], 200);
    assert_eq!(value["color"], phase.level().color_token());
}

#[test]
fn coefficient_edit_on_missing_entry_is_not_found() {
    let store = store_with(1);
    assert_eq!(
        store.update_coefficient(RiskId(42), CoefficientField::Severity, "7"),
        Err(StoreError::NotFound(RiskId(42)))
    );
}

#[test]
fn text_edits_cannot_create_duplicates() {
    let quota = QuotaGuard::default();
    let store = RiskEntryStore::new();
    let (store, _) = store
        .add_one(draft("Wet floor", "Slip"), &quota, SessionTier::Free)
        .expect("first");
    let (store, second) = store
        .add_one(draft("Wet stairs", "Slip"), &quota, SessionTier::Free)
        .expect("second");

    let error = store
        .update_text(second.id, TextField::Hazard, "Wet floor".to_string())
        .expect_err("would duplicate");
    assert!(matches!(error, StoreError::DuplicateEntry { .. }));

    let (store, updated) = store
        .update_text(second.id, TextField::Measures, "Anti-slip mats".to_string())
        .expect("measures edit");
    assert_eq!(updated.text.measures, "Anti-slip mats");
    assert_eq!(store.get(second.id), Some(&updated));
}

#[test]
fn severity_filter_keeps_entries_at_or_above_threshold() {
    let batch = vec![
        draft_in("99", "A", "a", (1, 10, 1)),
        draft_in("99", "B", "b", (3, 5, 5)),
        draft_in("99", "C", "c", (5, 5, 10)),
        draft_in("99", "D", "d", (4, 10, 10)),
    ];
    let (store, _) = RiskEntryStore::new()
        .add_many(batch, &QuotaGuard::default(), SessionTier::Free)
        .expect("batch fits");

    let scores = |tier| -> Vec<u32> {
        store
            .filter_by_severity(tier)
            .iter()
            .map(|entry| entry.current.score())
            .collect()
    };
    assert_eq!(scores(SeverityTier::All), vec![10, 75, 250, 400]);
    assert_eq!(scores(SeverityTier::MediumAndAbove), vec![75, 250, 400]);
    assert_eq!(scores(SeverityTier::HighAndAbove), vec![250, 400]);
}

#[test]
fn restored_store_never_reissues_live_ids() {
    let store = store_with(3);
    let restored = RiskEntryStore::from_entries(store.entries().to_vec(), 0);
    assert_eq!(restored.next_id(), 4);
    let restored = RiskEntryStore::from_entries(store.entries().to_vec(), 10);
    assert_eq!(restored.next_id(), 10);
}

#[test]
fn library_sequence_follows_category_counts() {
    let batch = vec![
        draft_in("01", "Exposed wiring", "Electric shock", (3, 6, 15)),
        draft_in("01", "Overloaded socket", "Fire", (6, 3, 40)),
        draft("Noise", "Hearing loss"),
    ];
    let (store, _) = RiskEntryStore::new()
        .add_many(batch, &QuotaGuard::default(), SessionTier::Free)
        .expect("batch fits");

    let library = catalog();
    assert_eq!(
        library.next_sequence(&CategoryCode::new("01"), store.entries()),
        "03"
    );
    assert_eq!(
        library.next_sequence(&CategoryCode::new("02"), store.entries()),
        "01"
    );
}
