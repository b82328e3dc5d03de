use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AssessmentKind, BoundednessTier, DifficultyLevel, HotsTier, QuestionKind, QuestionSource,
    QuestionStatus, ReviewDecision,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) source: QuestionSource,
    pub(crate) assessment_id: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) subject: String,
    pub(crate) grade_band: String,
    pub(crate) content: String,
    pub(crate) kind: QuestionKind,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) declared_difficulty: DifficultyLevel,
    pub(crate) claims_hots: bool,
    pub(crate) status: QuestionStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One analyzer verdict for one question. Rows are insert-only; a re-analysis
/// supersedes earlier rows and reads always take the most recent by
/// `(source, question_id)`. `review_priority` and `routing_reasons` are the
/// routing outcome stamped at insert time so the review queue can sort
/// without re-deriving it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QualityVerdict {
    pub(crate) id: String,
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
    pub(crate) bloom_level: Option<i16>,
    pub(crate) bloom_secondary: Json<Vec<i16>>,
    pub(crate) hots_tier: Option<HotsTier>,
    pub(crate) boundedness: Option<BoundednessTier>,
    pub(crate) difficulty_score: Option<f64>,
    pub(crate) difficulty_label: Option<DifficultyLevel>,
    pub(crate) clarity_score: Option<f64>,
    pub(crate) ambiguity_flags: Json<Vec<String>>,
    pub(crate) missing_info_flags: Json<Vec<String>>,
    pub(crate) grade_mismatch_flags: Json<Vec<String>>,
    pub(crate) suggested_edits: Json<Vec<String>>,
    pub(crate) bloom_confidence: Option<f64>,
    pub(crate) hots_confidence: Option<f64>,
    pub(crate) boundedness_confidence: Option<f64>,
    pub(crate) difficulty_confidence: Option<f64>,
    pub(crate) review_priority: Option<i32>,
    pub(crate) routing_reasons: Json<Vec<String>>,
    pub(crate) report: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AdminReview {
    pub(crate) id: String,
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) decision: ReviewDecision,
    pub(crate) notes: Option<String>,
    pub(crate) return_reasons: Json<Vec<String>>,
    pub(crate) bloom_override: Option<i16>,
    pub(crate) hots_override: Option<HotsTier>,
    pub(crate) boundedness_override: Option<BoundednessTier>,
    pub(crate) difficulty_override: Option<f64>,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assessment {
    pub(crate) id: String,
    pub(crate) kind: AssessmentKind,
    pub(crate) class_id: String,
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    pub(crate) is_active: bool,
    pub(crate) pending_publish: bool,
    pub(crate) published_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
