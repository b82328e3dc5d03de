use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::types::Json;
use tokio::sync::{Mutex as EnvMutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState, time::primitive_now_utc};
use crate::db::models::{AdminReview, Assessment, QualityVerdict, Question};
use crate::db::types::{
    AssessmentKind, BoundednessTier, DifficultyLevel, HotsTier, QuestionKind, QuestionSource,
    QuestionStatus,
};
use crate::repositories::{
    AssessmentGate, NewAdminReview, NewNotification, NewVerdict, PipelineStore, ReviewQueueEntry,
    StoreError,
};
use crate::services::analyzer::{AnalysisError, QualityAnalyzer};
use crate::services::verdict_decode::{self, DecodedVerdict, VerdictConfidence, VerdictReport};

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) analyzer: Arc<MockAnalyzer>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<EnvMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(EnvMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("AULA_ENV", "test");
    std::env::set_var("AULA_STRICT_CONFIG", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(MemoryStore::default());
    let analyzer = Arc::new(MockAnalyzer::default());
    let state = AppState::new(settings, store.clone(), analyzer.clone());
    let app = api::router::router(state.clone());

    TestContext { state, app, store, analyzer, _guard: guard }
}

/// Analyzer verdict with every dimension confidently in range; routes to
/// auto-approval unless a test degrades it.
pub(crate) fn clean_report() -> VerdictReport {
    VerdictReport {
        bloom_level: Some(4),
        bloom_secondary: vec![3],
        hots_tier: Some(HotsTier::H2),
        boundedness: Some(BoundednessTier::B2),
        difficulty_score: Some(5.0),
        difficulty_label: Some(DifficultyLevel::Medium),
        clarity_score: Some(90.0),
        ambiguity_flags: vec![],
        missing_info_flags: vec![],
        grade_mismatch_flags: vec![],
        suggested_edits: vec![],
        confidence: VerdictConfidence {
            bloom: Some(0.95),
            hots: Some(0.92),
            boundedness: Some(0.9),
            difficulty: Some(0.91),
        },
    }
}

pub(crate) fn sample_question(
    id: &str,
    source: QuestionSource,
    teacher_id: &str,
    assessment_id: Option<&str>,
) -> Question {
    let now = primitive_now_utc();
    Question {
        id: id.to_string(),
        source,
        assessment_id: assessment_id.map(str::to_string),
        teacher_id: teacher_id.to_string(),
        subject: "chemistry".to_string(),
        grade_band: "9-10".to_string(),
        content: "Balance the equation for the combustion of methane.".to_string(),
        kind: QuestionKind::Essay,
        options: Json(vec![]),
        correct_answer: None,
        declared_difficulty: DifficultyLevel::Medium,
        claims_hots: false,
        status: QuestionStatus::Draft,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_assessment(id: &str, class_id: &str, teacher_id: &str) -> Assessment {
    let now = primitive_now_utc();
    Assessment {
        id: id.to_string(),
        kind: AssessmentKind::Quiz,
        class_id: class_id.to_string(),
        teacher_id: teacher_id.to_string(),
        title: "Unit 3 quiz".to_string(),
        is_active: false,
        pending_publish: false,
        published_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Poll the store until the question reaches `expected` or the timeout
/// elapses. Analysis runs on detached tasks, so tests observe outcomes
/// through state just like real callers.
pub(crate) async fn wait_for_status(
    store: &MemoryStore,
    source: QuestionSource,
    question_id: &str,
    expected: QuestionStatus,
) -> bool {
    for _ in 0..200 {
        if store.question_status(source, question_id) == Some(expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    identity: Option<(&str, &str)>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some((user_id, role)) = identity {
        builder = builder.header("x-user-id", user_id).header("x-user-role", role);
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

// ---------------------------------------------------------------------------
// In-memory store double
// ---------------------------------------------------------------------------

/// `PipelineStore` over mutexed maps. Conditional updates check-and-write
/// under one lock, reproducing the row-level atomicity the Postgres
/// implementation gets from single conditional UPDATE statements.
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    questions: HashMap<(QuestionSource, String), Question>,
    verdicts: Vec<QualityVerdict>,
    reviews: Vec<AdminReview>,
    assessments: HashMap<String, Assessment>,
    enrollments: HashMap<String, Vec<String>>,
    admins: Vec<String>,
    notifications: Vec<NewNotification>,
}

impl MemoryStore {
    pub(crate) fn insert_question(&self, question: Question) {
        let mut inner = self.inner.lock().unwrap();
        inner.questions.insert((question.source, question.id.clone()), question);
    }

    pub(crate) fn insert_assessment(&self, assessment: Assessment) {
        let mut inner = self.inner.lock().unwrap();
        inner.assessments.insert(assessment.id.clone(), assessment);
    }

    pub(crate) fn set_admins(&self, admin_ids: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner.admins = admin_ids.iter().map(|id| id.to_string()).collect();
    }

    pub(crate) fn set_enrollment(&self, class_id: &str, student_ids: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .enrollments
            .insert(class_id.to_string(), student_ids.iter().map(|id| id.to_string()).collect());
    }

    pub(crate) fn question_status(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Option<QuestionStatus> {
        let inner = self.inner.lock().unwrap();
        inner.questions.get(&(source, question_id.to_string())).map(|question| question.status)
    }

    pub(crate) fn verdicts_for(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Vec<QualityVerdict> {
        let inner = self.inner.lock().unwrap();
        inner
            .verdicts
            .iter()
            .filter(|verdict| verdict.source == source && verdict.question_id == question_id)
            .cloned()
            .collect()
    }

    pub(crate) fn assessment(&self, assessment_id: &str) -> Option<Assessment> {
        let inner = self.inner.lock().unwrap();
        inner.assessments.get(assessment_id).cloned()
    }

    pub(crate) fn notifications(&self) -> Vec<NewNotification> {
        let inner = self.inner.lock().unwrap();
        inner.notifications.clone()
    }

    pub(crate) fn reviews(&self) -> Vec<AdminReview> {
        let inner = self.inner.lock().unwrap();
        inner.reviews.clone()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_question(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Result<Option<Question>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.questions.get(&(source, question_id.to_string())).cloned())
    }

    async fn claim_for_analysis(
        &self,
        source: QuestionSource,
        question_id: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<Option<Question>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(question) = inner.questions.get_mut(&(source, question_id.to_string())) else {
            return Ok(None);
        };

        let claimable = matches!(
            question.status,
            QuestionStatus::Draft | QuestionStatus::Approved | QuestionStatus::AdminReview
        );
        if !claimable {
            return Ok(None);
        }

        question.status = QuestionStatus::Analyzing;
        question.updated_at = now;
        Ok(Some(question.clone()))
    }

    async fn release_to_draft(
        &self,
        source: QuestionSource,
        question_id: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(question) = inner.questions.get_mut(&(source, question_id.to_string())) else {
            return Ok(false);
        };

        if question.status != QuestionStatus::Analyzing {
            return Ok(false);
        }

        question.status = QuestionStatus::Draft;
        question.updated_at = now;
        Ok(true)
    }

    async fn transition_status(
        &self,
        source: QuestionSource,
        question_id: &str,
        from: &[QuestionStatus],
        to: QuestionStatus,
        now: time::PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(question) = inner.questions.get_mut(&(source, question_id.to_string())) else {
            return Ok(false);
        };

        if !from.contains(&question.status) {
            return Ok(false);
        }

        question.status = to;
        question.updated_at = now;
        Ok(true)
    }

    async fn insert_verdict(&self, verdict: NewVerdict) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.verdicts.push(QualityVerdict {
            id: verdict.id,
            source: verdict.source,
            question_id: verdict.question_id,
            bloom_level: verdict.bloom_level,
            bloom_secondary: Json(verdict.bloom_secondary),
            hots_tier: verdict.hots_tier,
            boundedness: verdict.boundedness,
            difficulty_score: verdict.difficulty_score,
            difficulty_label: verdict.difficulty_label,
            clarity_score: verdict.clarity_score,
            ambiguity_flags: Json(verdict.ambiguity_flags),
            missing_info_flags: Json(verdict.missing_info_flags),
            grade_mismatch_flags: Json(verdict.grade_mismatch_flags),
            suggested_edits: Json(verdict.suggested_edits),
            bloom_confidence: verdict.bloom_confidence,
            hots_confidence: verdict.hots_confidence,
            boundedness_confidence: verdict.boundedness_confidence,
            difficulty_confidence: verdict.difficulty_confidence,
            review_priority: verdict.review_priority,
            routing_reasons: Json(verdict.routing_reasons),
            report: Json(verdict.report),
            created_at: verdict.created_at,
        });
        Ok(())
    }

    async fn latest_verdict(
        &self,
        source: QuestionSource,
        question_id: &str,
    ) -> Result<Option<QualityVerdict>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .verdicts
            .iter()
            .rev()
            .find(|verdict| verdict.source == source && verdict.question_id == question_id)
            .cloned())
    }

    async fn insert_review(&self, review: NewAdminReview) -> Result<AdminReview, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = AdminReview {
            id: review.id,
            source: review.source,
            question_id: review.question_id,
            reviewer_id: review.reviewer_id,
            decision: review.decision,
            notes: review.notes,
            return_reasons: Json(review.return_reasons),
            bloom_override: review.bloom_override,
            hots_override: review.hots_override,
            boundedness_override: review.boundedness_override,
            difficulty_override: review.difficulty_override,
            created_at: review.created_at,
        };
        inner.reviews.push(row.clone());
        Ok(row)
    }

    async fn assessment_gate(
        &self,
        assessment_id: &str,
    ) -> Result<Option<AssessmentGate>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(assessment) = inner.assessments.get(assessment_id).cloned() else {
            return Ok(None);
        };

        let child_statuses = inner
            .questions
            .values()
            .filter(|question| question.assessment_id.as_deref() == Some(assessment_id))
            .map(|question| question.status)
            .collect();

        Ok(Some(AssessmentGate { assessment, child_statuses }))
    }

    async fn mark_pending_publish(
        &self,
        assessment_id: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(assessment) = inner.assessments.get_mut(assessment_id) else {
            return Ok(false);
        };

        if assessment.is_active || assessment.pending_publish {
            return Ok(false);
        }

        assessment.pending_publish = true;
        assessment.updated_at = now;
        Ok(true)
    }

    async fn activate_if_pending(
        &self,
        assessment_id: &str,
        now: time::PrimitiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(assessment) = inner.assessments.get_mut(assessment_id) else {
            return Ok(false);
        };

        // Same predicate as the SQL conditional update; the surrounding
        // lock plays the role of row-level atomicity.
        if !assessment.pending_publish {
            return Ok(false);
        }

        assessment.is_active = true;
        assessment.pending_publish = false;
        assessment.published_at = Some(now);
        assessment.updated_at = now;
        Ok(true)
    }

    async fn enrolled_student_ids(&self, class_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.enrollments.get(class_id).cloned().unwrap_or_default())
    }

    async fn admin_ids(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.admins.clone())
    }

    async fn list_review_queue(
        &self,
        status: QuestionStatus,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<ReviewQueueEntry>, i64), StoreError> {
        let inner = self.inner.lock().unwrap();

        let mut entries: Vec<ReviewQueueEntry> = inner
            .questions
            .values()
            .filter(|question| question.status == status)
            .map(|question| {
                let verdict = inner
                    .verdicts
                    .iter()
                    .rev()
                    .find(|verdict| {
                        verdict.source == question.source && verdict.question_id == question.id
                    });

                ReviewQueueEntry {
                    question_id: question.id.clone(),
                    source: question.source,
                    teacher_id: question.teacher_id.clone(),
                    subject: question.subject.clone(),
                    grade_band: question.grade_band.clone(),
                    content: question.content.clone(),
                    status: question.status,
                    updated_at: question.updated_at,
                    verdict_id: verdict.map(|verdict| verdict.id.clone()),
                    review_priority: verdict.and_then(|verdict| verdict.review_priority),
                    routing_reasons: verdict.map(|verdict| verdict.routing_reasons.clone()),
                    bloom_level: verdict.and_then(|verdict| verdict.bloom_level),
                    clarity_score: verdict.and_then(|verdict| verdict.clarity_score),
                    verdict_created_at: verdict.map(|verdict| verdict.created_at),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            let priority_a = a.review_priority.unwrap_or(0);
            let priority_b = b.review_priority.unwrap_or(0);
            priority_a
                .cmp(&priority_b)
                .then_with(|| b.verdict_created_at.cmp(&a.verdict_created_at))
        });

        let total = entries.len() as i64;
        let skip = skip.max(0) as usize;
        let limit = limit.clamp(1, 500) as usize;
        let page = entries.into_iter().skip(skip).take(limit).collect();

        Ok((page, total))
    }

    async fn insert_notifications(
        &self,
        notifications: Vec<NewNotification>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.notifications.extend(notifications);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted analyzer double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) enum MockOutcome {
    /// Return this report as a successful verdict.
    Report(VerdictReport),
    /// Run this raw text through the real decoder, like the HTTP client
    /// does with a response body.
    RawText(String),
    ProviderFailure(String),
}

/// Scripted `QualityAnalyzer` that records call concurrency so tests can
/// assert the dispatcher's batch width.
pub(crate) struct MockAnalyzer {
    outcomes: Mutex<HashMap<(QuestionSource, String), MockOutcome>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockAnalyzer {
    pub(crate) fn set_outcome(
        &self,
        source: QuestionSource,
        question_id: &str,
        outcome: MockOutcome,
    ) {
        let mut outcomes = self.outcomes.lock().unwrap();
        outcomes.insert((source, question_id.to_string()), outcome);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QualityAnalyzer for MockAnalyzer {
    async fn analyze(&self, question: &Question) -> Result<DecodedVerdict, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        // Unscripted questions get a confidently clean verdict.
        let outcome = {
            let outcomes = self.outcomes.lock().unwrap();
            outcomes
                .get(&(question.source, question.id.clone()))
                .cloned()
                .unwrap_or_else(|| MockOutcome::Report(clean_report()))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            MockOutcome::Report(report) => {
                let raw = serde_json::to_value(&report).expect("serialize report");
                Ok(DecodedVerdict { report, raw })
            }
            MockOutcome::RawText(raw) => {
                verdict_decode::decode_verdict(&raw).map_err(|err| AnalysisError::Malformed {
                    reason: err.to_string(),
                    raw,
                })
            }
            MockOutcome::ProviderFailure(message) => Err(AnalysisError::Provider(message)),
        }
    }
}
