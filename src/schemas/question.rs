use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::QualityVerdict;
use crate::db::types::{
    BoundednessTier, DifficultyLevel, HotsTier, QuestionSource, QuestionStatus,
};
use crate::repositories::ReviewQueueEntry;

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeQueuedResponse {
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
    pub(crate) status: &'static str,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct BulkAnalyzeItem {
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BulkAnalyzeRequest {
    #[validate(length(min = 1, max = 100, message = "between 1 and 100 items per dispatch"))]
    pub(crate) items: Vec<BulkAnalyzeItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkQueuedResponse {
    pub(crate) accepted: usize,
    pub(crate) skipped: usize,
    pub(crate) status: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerdictConfidenceResponse {
    pub(crate) bloom: Option<f64>,
    pub(crate) hots: Option<f64>,
    pub(crate) boundedness: Option<f64>,
    pub(crate) difficulty: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerdictResponse {
    pub(crate) id: String,
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
    pub(crate) bloom_level: Option<i16>,
    pub(crate) bloom_secondary: Vec<i16>,
    pub(crate) hots_tier: Option<HotsTier>,
    pub(crate) boundedness: Option<BoundednessTier>,
    pub(crate) difficulty_score: Option<f64>,
    pub(crate) difficulty_label: Option<DifficultyLevel>,
    pub(crate) clarity_score: Option<f64>,
    pub(crate) ambiguity_flags: Vec<String>,
    pub(crate) missing_info_flags: Vec<String>,
    pub(crate) grade_mismatch_flags: Vec<String>,
    pub(crate) suggested_edits: Vec<String>,
    pub(crate) confidence: VerdictConfidenceResponse,
    pub(crate) review_priority: Option<i32>,
    pub(crate) routing_reasons: Vec<String>,
    pub(crate) report: serde_json::Value,
    pub(crate) created_at: String,
}

impl From<QualityVerdict> for VerdictResponse {
    fn from(verdict: QualityVerdict) -> Self {
        Self {
            id: verdict.id,
            source: verdict.source,
            question_id: verdict.question_id,
            bloom_level: verdict.bloom_level,
            bloom_secondary: verdict.bloom_secondary.0,
            hots_tier: verdict.hots_tier,
            boundedness: verdict.boundedness,
            difficulty_score: verdict.difficulty_score,
            difficulty_label: verdict.difficulty_label,
            clarity_score: verdict.clarity_score,
            ambiguity_flags: verdict.ambiguity_flags.0,
            missing_info_flags: verdict.missing_info_flags.0,
            grade_mismatch_flags: verdict.grade_mismatch_flags.0,
            suggested_edits: verdict.suggested_edits.0,
            confidence: VerdictConfidenceResponse {
                bloom: verdict.bloom_confidence,
                hots: verdict.hots_confidence,
                boundedness: verdict.boundedness_confidence,
                difficulty: verdict.difficulty_confidence,
            },
            review_priority: verdict.review_priority,
            routing_reasons: verdict.routing_reasons.0,
            report: verdict.report.0,
            created_at: format_primitive(verdict.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewQueueItemResponse {
    pub(crate) question_id: String,
    pub(crate) source: QuestionSource,
    pub(crate) teacher_id: String,
    pub(crate) subject: String,
    pub(crate) grade_band: String,
    pub(crate) content: String,
    pub(crate) status: QuestionStatus,
    pub(crate) review_priority: Option<i32>,
    pub(crate) routing_reasons: Vec<String>,
    pub(crate) bloom_level: Option<i16>,
    pub(crate) clarity_score: Option<f64>,
    pub(crate) verdict_created_at: Option<String>,
    pub(crate) updated_at: String,
}

impl From<ReviewQueueEntry> for ReviewQueueItemResponse {
    fn from(entry: ReviewQueueEntry) -> Self {
        Self {
            question_id: entry.question_id,
            source: entry.source,
            teacher_id: entry.teacher_id,
            subject: entry.subject,
            grade_band: entry.grade_band,
            content: entry.content,
            status: entry.status,
            review_priority: entry.review_priority,
            routing_reasons: entry.routing_reasons.map(|reasons| reasons.0).unwrap_or_default(),
            bloom_level: entry.bloom_level,
            clarity_score: entry.clarity_score,
            verdict_created_at: entry.verdict_created_at.map(format_primitive),
            updated_at: format_primitive(entry.updated_at),
        }
    }
}
