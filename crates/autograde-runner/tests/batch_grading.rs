//! Batch grading: ordering, worker limits, failure isolation and re-grading.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use autograde_core::{AlignmentStrategy, RubricSchema};
use autograde_runner::{
    BatchConfig, BatchGrader, Correction, CorrectionEntry, GradeStore, GradingKey,
    GradingRecord, GradingRequest, MemoryGradeStore, RunnerError, ScriptedBackend, TaskStatus,
};

const GOOD_RESPONSE: &str = r#"{"rubric_scores": [{"criteria": "Define X", "score": 2}, {"criteria": "Give example", "score": 1}], "total_score": 3, "feedback": "Good."}"#;

fn rubric() -> RubricSchema {
    RubricSchema::from_json(
        r#"[{"criteria": "Define X", "points": 2}, {"criteria": "Give example", "points": 1}]"#,
    )
    .expect("valid rubric")
}

fn request(student: &str) -> GradingRequest {
    GradingRequest {
        key: GradingKey::new(student, "A1", "Q1"),
        question_text: "Define X and give an example.".to_string(),
        ideal_answer: Some("X is ...".to_string()),
        student_answer: "X is a thing.".to_string(),
        rubric: rubric(),
        language: "English".to_string(),
    }
}

/// Store that rejects writes for one key and delegates everything else.
struct RejectingStore {
    inner: MemoryGradeStore,
    reject: GradingKey,
}

#[async_trait]
impl GradeStore for RejectingStore {
    async fn upsert(&self, record: GradingRecord) -> autograde_runner::Result<GradingRecord> {
        if record.key == self.reject {
            return Err(RunnerError::Storage("connection reset".to_string()));
        }
        self.inner.upsert(record).await
    }

    async fn get(&self, id: Uuid) -> autograde_runner::Result<GradingRecord> {
        self.inner.get(id).await
    }

    async fn find(&self, key: &GradingKey) -> autograde_runner::Result<Option<GradingRecord>> {
        self.inner.find(key).await
    }

    async fn apply_correction(
        &self,
        id: Uuid,
        correction: &Correction,
    ) -> autograde_runner::Result<CorrectionEntry> {
        self.inner.apply_correction(id, correction).await
    }

    async fn corrections(&self, id: Uuid) -> autograde_runner::Result<Vec<CorrectionEntry>> {
        self.inner.corrections(id).await
    }

    async fn list(&self) -> autograde_runner::Result<Vec<GradingRecord>> {
        self.inner.list().await
    }
}

fn grader(backend: Arc<ScriptedBackend>, store: Arc<dyn GradeStore>, max: usize) -> BatchGrader {
    let config = BatchConfig {
        max_concurrency: max,
        ..BatchConfig::default()
    };
    BatchGrader::new(backend, store, config)
}

#[tokio::test(start_paused = true)]
async fn outcomes_follow_request_order() {
    let backend = Arc::new(
        ScriptedBackend::new("mistral", GOOD_RESPONSE)
            .with_response(
                GradingKey::new("s2", "A1", "Q1"),
                r#"{"rubric_scores": [], "total_score": 1, "feedback": "Weak."}"#,
            )
            .with_delay(Duration::from_millis(10)),
    );
    let store = Arc::new(MemoryGradeStore::new());
    let grader = grader(backend.clone(), store.clone(), 3);

    let requests: Vec<_> = (0..5).map(|i| request(&format!("s{i}"))).collect();
    let report = grader.run(requests).await;

    let students: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| o.key.student_id.as_str())
        .collect();
    assert_eq!(students, vec!["s0", "s1", "s2", "s3", "s4"]);
    assert_eq!(report.graded_count(), 5);
    assert_eq!(report.failed_count(), 0);
    assert_eq!(backend.calls(), 5);

    assert_eq!(report.outcomes[0].total, 3);
    assert_eq!(report.outcomes[0].total_possible, 3);
    assert_eq!(report.outcomes[2].total, 1);

    let s2 = store
        .find(&GradingKey::new("s2", "A1", "Q1"))
        .await
        .unwrap()
        .expect("stored");
    assert_eq!(s2.sanity.strategy, AlignmentStrategy::ProportionalFallback);
    assert_eq!(store.list().await.unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_limit() {
    let backend =
        Arc::new(ScriptedBackend::new("mistral", GOOD_RESPONSE).with_delay(Duration::from_millis(50)));
    let store = Arc::new(MemoryGradeStore::new());
    let grader = grader(backend.clone(), store, 2);

    let requests: Vec<_> = (0..6).map(|i| request(&format!("s{i}"))).collect();
    let report = grader.run(requests).await;

    assert_eq!(report.graded_count(), 6);
    assert_eq!(backend.peak_concurrency(), 2);
}

#[tokio::test]
async fn zero_concurrency_is_treated_as_one() {
    let backend = Arc::new(ScriptedBackend::new("mistral", GOOD_RESPONSE));
    let store = Arc::new(MemoryGradeStore::new());
    let grader = grader(backend.clone(), store, 0);

    let report = grader.run(vec![request("s1"), request("s2")]).await;
    assert_eq!(report.graded_count(), 2);
    assert_eq!(backend.peak_concurrency(), 1);
}

#[tokio::test]
async fn backend_failure_is_isolated_and_stored_as_zero() {
    let failing = GradingKey::new("s1", "A1", "Q1");
    let backend = Arc::new(
        ScriptedBackend::new("mistral", GOOD_RESPONSE).with_failure(failing.clone(), "model offline"),
    );
    let store = Arc::new(MemoryGradeStore::new());
    let grader = grader(backend, store.clone(), 2);

    let report = grader
        .run(vec![request("s0"), request("s1"), request("s2")])
        .await;

    assert_eq!(report.graded_count(), 2);
    assert_eq!(report.failed_count(), 1);

    let outcome = &report.outcomes[1];
    assert_eq!(outcome.status, TaskStatus::BackendFailed);
    assert_eq!(outcome.total, 0);
    assert_eq!(outcome.error.as_deref(), Some("model offline"));
    assert!(outcome.record_id.is_some());

    let stored = store.find(&failing).await.unwrap().expect("stored");
    assert_eq!(stored.new_score, 0);
    assert!(stored.aligned_scores.iter().all(|a| a.score == 0));
    assert_eq!(stored.sanity.strategy, AlignmentStrategy::Empty);
    assert_eq!(stored.sanity.backend_failure.as_deref(), Some("model offline"));
    assert!(stored.new_feedback.ends_with("Grading failed: model offline"));
}

#[tokio::test]
async fn unparseable_response_is_graded_with_zero_and_flagged() {
    let key = GradingKey::new("s1", "A1", "Q1");
    let backend = Arc::new(
        ScriptedBackend::new("mistral", GOOD_RESPONSE).with_response(key.clone(), "I cannot grade this."),
    );
    let store = Arc::new(MemoryGradeStore::new());
    let report = grader(backend, store.clone(), 1).run(vec![request("s1")]).await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, TaskStatus::Graded);
    assert_eq!(outcome.total, 0);
    assert!(outcome.anomalies > 0);

    let stored = store.find(&key).await.unwrap().expect("stored");
    assert_eq!(stored.sanity.strategy, AlignmentStrategy::ParseFailed);
    assert!(stored.sanity.parse_failure.is_some());
}

#[tokio::test]
async fn regrading_keeps_identity_and_original_score() {
    let key = GradingKey::new("s1", "A1", "Q1");
    let store = Arc::new(MemoryGradeStore::new());

    let first = Arc::new(ScriptedBackend::new("mistral", GOOD_RESPONSE));
    let report = grader(first, store.clone(), 1).run(vec![request("s1")]).await;
    let first_id = report.outcomes[0].record_id.expect("stored");

    let stored = store.find(&key).await.unwrap().expect("stored");
    assert_eq!(stored.student_answer, "X is a thing.");
    assert_eq!(stored.language, "English");

    let second = Arc::new(ScriptedBackend::new(
        "llama",
        r#"{"rubric_scores": [{"criteria": "Define X", "score": 1}], "feedback": "Partial."}"#,
    ));
    let resubmitted = GradingRequest {
        student_answer: "X is a kind of Y.".to_string(),
        language: "German".to_string(),
        ..request("s1")
    };
    let report = grader(second, store.clone(), 1).run(vec![resubmitted]).await;
    assert_eq!(report.outcomes[0].record_id, Some(first_id));

    let stored = store.find(&key).await.unwrap().expect("stored");
    assert_eq!(stored.id, first_id);
    assert_eq!(stored.old_score, 3);
    assert_eq!(stored.new_score, 1);
    assert_eq!(stored.model_id, "llama");
    assert_eq!(stored.student_answer, "X is a kind of Y.");
    assert_eq!(stored.language, "German");
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_failure_is_reported_per_task() {
    let rejected = GradingKey::new("s1", "A1", "Q1");
    let store = Arc::new(RejectingStore {
        inner: MemoryGradeStore::new(),
        reject: rejected.clone(),
    });
    let backend = Arc::new(ScriptedBackend::new("mistral", GOOD_RESPONSE));
    let report = grader(backend, store.clone(), 2)
        .run(vec![request("s0"), request("s1"), request("s2")])
        .await;

    assert_eq!(report.graded_count(), 2);
    assert_eq!(report.failed_count(), 1);

    let failed = &report.outcomes[1];
    assert_eq!(failed.status, TaskStatus::StoreFailed);
    assert_eq!(failed.record_id, None);
    assert!(failed
        .error
        .as_deref()
        .is_some_and(|e| e.contains("connection reset")));
    assert_eq!(failed.total, 3);

    for outcome in [&report.outcomes[0], &report.outcomes[2]] {
        assert_eq!(outcome.status, TaskStatus::Graded);
        assert!(outcome.record_id.is_some());
    }
    assert!(store.find(&rejected).await.unwrap().is_none());
    assert_eq!(store.list().await.unwrap().len(), 2);
}
