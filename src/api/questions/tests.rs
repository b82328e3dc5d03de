use axum::http::{Method, StatusCode};
use tower::ServiceExt;

use crate::db::types::{QuestionSource, QuestionStatus};
use crate::services::lifecycle;
use crate::test_support::{self, MockOutcome};

const TEACHER: Option<(&str, &str)> = Some(("teacher-1", "teacher"));
const OTHER_TEACHER: Option<(&str, &str)> = Some(("teacher-2", "teacher"));
const ADMIN: Option<(&str, &str)> = Some(("admin-1", "admin"));
const STUDENT: Option<(&str, &str)> = Some(("student-1", "student"));

#[tokio::test]
async fn analyze_requires_gateway_identity() {
    let ctx = test_support::setup_test_context().await;

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/analyze",
        None,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_trigger_analysis() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.insert_question(test_support::sample_question(
        "q1",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/analyze",
        STUDENT,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_source_is_rejected() {
    let ctx = test_support::setup_test_context().await;

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/homework/questions/q1/analyze",
        TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_question_is_not_found() {
    let ctx = test_support::setup_test_context().await;

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/nope/analyze",
        TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn teachers_cannot_analyze_foreign_questions() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.insert_question(test_support::sample_question(
        "q1",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/analyze",
        OTHER_TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn analyze_accepts_and_question_auto_approves() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.insert_question(test_support::sample_question(
        "q1",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/analyze",
        TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    // The handler answers before the analyzer does.
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = test_support::read_json(response).await;
    assert_eq!(json["status"], "queued");

    assert!(
        test_support::wait_for_status(
            &ctx.store,
            QuestionSource::Bank,
            "q1",
            QuestionStatus::Approved
        )
        .await
    );
    assert_eq!(ctx.store.verdicts_for(QuestionSource::Bank, "q1").len(), 1);
}

#[tokio::test]
async fn notation_heavy_reply_flows_through_the_decoder() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.set_admins(&["admin-1"]);
    ctx.store.insert_question(test_support::sample_question(
        "q1",
        QuestionSource::Exam,
        "teacher-1",
        None,
    ));

    // Body as it would arrive from the analyzer: fenced, with LaTeX
    // commands colliding with JSON escapes.
    let raw = r#"```json
{
  "bloom_level": 5,
  "bloom_secondary": [],
  "hots_tier": "H2",
  "boundedness": "B0",
  "difficulty_score": 6.0,
  "clarity_score": 75.0,
  "ambiguity_flags": [],
  "missing_info_flags": [],
  "grade_mismatch_flags": [],
  "suggested_edits": ["state that x \neq 0", "write \frac{1}{2} as 0.5"],
  "confidence": {"bloom": 0.9, "hots": 0.85, "boundedness": 0.95, "difficulty": 0.9}
}
```"#;
    ctx.analyzer.set_outcome(
        QuestionSource::Exam,
        "q1",
        MockOutcome::RawText(raw.to_string()),
    );

    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/exam/questions/q1/analyze",
        TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    assert!(
        test_support::wait_for_status(
            &ctx.store,
            QuestionSource::Exam,
            "q1",
            QuestionStatus::AdminReview
        )
        .await
    );

    let request = test_support::json_request(
        Method::GET,
        "/api/v1/sources/exam/questions/q1/verdict",
        TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let json = test_support::read_json(response).await;
    assert_eq!(json["boundedness"], "B0");
    assert_eq!(json["review_priority"], 1);
    assert!(!json["routing_reasons"].as_array().unwrap().is_empty());
    // Notation survived as literal backslashes.
    assert_eq!(json["suggested_edits"][0], "state that x \\neq 0");
    assert_eq!(json["suggested_edits"][1], "write \\frac{1}{2} as 0.5");
}

#[tokio::test]
async fn bulk_dispatch_skips_unowned_and_missing_items() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.insert_question(test_support::sample_question(
        "mine-1",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));
    ctx.store.insert_question(test_support::sample_question(
        "mine-2",
        QuestionSource::Quiz,
        "teacher-1",
        None,
    ));
    ctx.store.insert_question(test_support::sample_question(
        "theirs",
        QuestionSource::Bank,
        "teacher-2",
        None,
    ));

    let body = serde_json::json!({
        "items": [
            {"source": "bank", "question_id": "mine-1"},
            {"source": "quiz", "question_id": "mine-2"},
            {"source": "bank", "question_id": "theirs"},
            {"source": "bank", "question_id": "ghost"}
        ]
    });
    let request = test_support::json_request(
        Method::POST,
        "/api/v1/questions/analyze-bulk",
        TEACHER,
        Some(body),
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = test_support::read_json(response).await;
    assert_eq!(json["accepted"], 2);
    assert_eq!(json["skipped"], 2);

    assert!(
        test_support::wait_for_status(
            &ctx.store,
            QuestionSource::Bank,
            "mine-1",
            QuestionStatus::Approved
        )
        .await
    );
    assert!(
        test_support::wait_for_status(
            &ctx.store,
            QuestionSource::Quiz,
            "mine-2",
            QuestionStatus::Approved
        )
        .await
    );
    // The foreign question was never touched.
    assert_eq!(
        ctx.store.question_status(QuestionSource::Bank, "theirs"),
        Some(QuestionStatus::Draft)
    );
}

#[tokio::test]
async fn empty_bulk_request_is_rejected() {
    let ctx = test_support::setup_test_context().await;

    let body = serde_json::json!({"items": []});
    let request = test_support::json_request(
        Method::POST,
        "/api/v1/questions/analyze-bulk",
        TEACHER,
        Some(body),
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn review_requires_admin_role() {
    let ctx = test_support::setup_test_context().await;
    let mut question = test_support::sample_question("q1", QuestionSource::Bank, "teacher-1", None);
    question.status = QuestionStatus::AdminReview;
    ctx.store.insert_question(question);

    let body = serde_json::json!({"decision": "approve"});
    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/review",
        TEACHER,
        Some(body),
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_approval_moves_question_out_of_the_queue() {
    let ctx = test_support::setup_test_context().await;
    let mut question = test_support::sample_question("q1", QuestionSource::Quiz, "teacher-1", None);
    question.status = QuestionStatus::AdminReview;
    ctx.store.insert_question(question);

    let body = serde_json::json!({
        "decision": "approve",
        "notes": "clear after second read",
        "bloom_override": 5
    });
    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/quiz/questions/q1/review",
        ADMIN,
        Some(body),
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = test_support::read_json(response).await;
    assert_eq!(json["decision"], "approve");
    assert_eq!(json["reviewer_id"], "admin-1");
    assert_eq!(json["bloom_override"], 5);

    assert_eq!(
        ctx.store.question_status(QuestionSource::Quiz, "q1"),
        Some(QuestionStatus::Approved)
    );
    assert_eq!(ctx.store.reviews().len(), 1);
}

#[tokio::test]
async fn review_decision_on_wrong_state_conflicts() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.insert_question(test_support::sample_question(
        "q1",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));

    let body = serde_json::json!({"decision": "return", "return_reasons": ["too vague"]});
    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/review",
        ADMIN,
        Some(body),
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn review_payload_is_validated() {
    let ctx = test_support::setup_test_context().await;
    let mut question = test_support::sample_question("q1", QuestionSource::Bank, "teacher-1", None);
    question.status = QuestionStatus::AdminReview;
    ctx.store.insert_question(question);

    let body = serde_json::json!({"decision": "approve", "bloom_override": 9});
    let request = test_support::json_request(
        Method::POST,
        "/api/v1/sources/bank/questions/q1/review",
        ADMIN,
        Some(body),
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verdict_endpoint_reports_missing_verdict() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.insert_question(test_support::sample_question(
        "q1",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));

    let request = test_support::json_request(
        Method::GET,
        "/api/v1/sources/bank/questions/q1/verdict",
        TEACHER,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_queue_is_admin_only_and_priority_ordered() {
    let ctx = test_support::setup_test_context().await;
    ctx.store.set_admins(&["admin-1"]);

    ctx.store.insert_question(test_support::sample_question(
        "routine",
        QuestionSource::Bank,
        "teacher-1",
        None,
    ));
    ctx.store.insert_question(test_support::sample_question(
        "urgent",
        QuestionSource::Exam,
        "teacher-1",
        None,
    ));

    // "routine" trips only the low-confidence rule (priority 3),
    // "urgent" has an unbounded answer scope (priority 1).
    let mut low_confidence = test_support::clean_report();
    low_confidence.confidence.hots = Some(0.4);
    ctx.analyzer.set_outcome(
        QuestionSource::Bank,
        "routine",
        MockOutcome::Report(low_confidence),
    );

    let mut unbounded = test_support::clean_report();
    unbounded.boundedness = Some(crate::db::types::BoundednessTier::B0);
    ctx.analyzer.set_outcome(QuestionSource::Exam, "urgent", MockOutcome::Report(unbounded));

    lifecycle::analyze_question(&ctx.state, QuestionSource::Bank, "routine")
        .await
        .expect("pipeline");
    lifecycle::analyze_question(&ctx.state, QuestionSource::Exam, "urgent")
        .await
        .expect("pipeline");

    let request =
        test_support::json_request(Method::GET, "/api/v1/review-queue", STUDENT, None);
    let response = ctx.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let request = test_support::json_request(Method::GET, "/api/v1/review-queue", ADMIN, None);
    let response = ctx.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let json = test_support::read_json(response).await;
    assert_eq!(json["total_count"], 2);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items[0]["question_id"], "urgent");
    assert_eq!(items[0]["review_priority"], 1);
    assert_eq!(items[1]["question_id"], "routine");
    assert_eq!(items[1]["review_priority"], 3);
}

#[tokio::test]
async fn review_queue_rejects_unknown_status_filter() {
    let ctx = test_support::setup_test_context().await;

    let request = test_support::json_request(
        Method::GET,
        "/api/v1/review-queue?status=pending",
        ADMIN,
        None,
    );
    let response = ctx.app.clone().oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
