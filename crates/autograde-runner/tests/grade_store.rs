//! Grade store contract: lookups, corrections and correction history.

use autograde_core::{ReconciliationPipeline, RubricSchema};
use autograde_runner::{
    Correction, GradeStore, GradingKey, GradingRecord, MemoryGradeStore, RunnerError,
};
use uuid::Uuid;

fn record(student: &str) -> GradingRecord {
    let rubric = RubricSchema::from_json(
        r#"[{"criteria": "Define X", "points": 2}, {"criteria": "Give example", "points": 1}]"#,
    )
    .expect("valid rubric");
    let result = ReconciliationPipeline::default().reconcile(
        &rubric,
        r#"{"rubric_scores": [{"criteria": "Define X", "score": 1}], "feedback": "Needs an example."}"#,
    );
    GradingRecord::new(GradingKey::new(student, "A1", "Q1"), "mistral", rubric, result)
}

fn correction(scores: Vec<i64>, editor: &str) -> Correction {
    Correction {
        scores,
        feedback: "Good definition.\nGood definition.\n\nExample missing.".to_string(),
        editor_id: editor.to_string(),
    }
}

#[tokio::test]
async fn get_and_find_return_stored_record() {
    let store = MemoryGradeStore::new();
    let stored = store.upsert(record("s1")).await.unwrap();

    assert_eq!(store.get(stored.id).await.unwrap(), stored);
    let found = store
        .find(&GradingKey::new("s1", "A1", "Q1"))
        .await
        .unwrap();
    assert_eq!(found, Some(stored));
    assert!(store
        .find(&GradingKey::new("s2", "A1", "Q1"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn missing_record_is_reported() {
    let store = MemoryGradeStore::new();
    let id = Uuid::new_v4();

    assert!(matches!(
        store.get(id).await,
        Err(RunnerError::RecordNotFound(missing)) if missing == id
    ));
    assert!(matches!(
        store.corrections(id).await,
        Err(RunnerError::RecordNotFound(_))
    ));
    assert!(matches!(
        store.apply_correction(id, &correction(vec![1, 1], "e")).await,
        Err(RunnerError::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn corrections_update_record_and_accumulate_history() {
    let store = MemoryGradeStore::new();
    let stored = store.upsert(record("s1")).await.unwrap();
    assert!(store.corrections(stored.id).await.unwrap().is_empty());

    let first = store
        .apply_correction(stored.id, &correction(vec![2, 0], "ta@uni.example"))
        .await
        .unwrap();
    assert_eq!(first.old_score, 1);
    assert_eq!(first.new_score, 2);
    assert_eq!(first.new_feedback, "Good definition.\nExample missing.");

    let second = store
        .apply_correction(stored.id, &correction(vec![9, -4], "prof@uni.example"))
        .await
        .unwrap();
    assert_eq!(second.old_score, 2);
    assert_eq!(second.new_score, 2);

    let current = store.get(stored.id).await.unwrap();
    assert_eq!(current.old_score, 1);
    assert_eq!(current.new_score, 2);
    let scores: Vec<u32> = current.aligned_scores.iter().map(|a| a.score).collect();
    assert_eq!(scores, vec![2, 0]);

    let history = store.corrections(stored.id).await.unwrap();
    let editors: Vec<_> = history.iter().map(|h| h.editor_id.as_str()).collect();
    assert_eq!(editors, vec!["ta@uni.example", "prof@uni.example"]);
}

#[tokio::test]
async fn rejected_correction_leaves_record_untouched() {
    let store = MemoryGradeStore::new();
    let stored = store.upsert(record("s1")).await.unwrap();

    let err = store
        .apply_correction(stored.id, &correction(vec![2], "e"))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::CorrectionLength { expected: 2, got: 1 }));

    assert_eq!(store.get(stored.id).await.unwrap(), stored);
    assert!(store.corrections(stored.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_is_ordered_by_key() {
    let store = MemoryGradeStore::new();
    for student in ["s3", "s1", "s2"] {
        store.upsert(record(student)).await.unwrap();
    }
    let students: Vec<_> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.key.student_id)
        .collect();
    assert_eq!(students, vec!["s1", "s2", "s3"]);
}
