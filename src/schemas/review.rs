use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::AdminReview;
use crate::db::types::{BoundednessTier, HotsTier, QuestionSource, ReviewDecision};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReviewRequest {
    pub(crate) decision: ReviewDecision,
    #[validate(length(max = 2000, message = "notes are limited to 2000 characters"))]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20, message = "at most 20 return reasons"))]
    pub(crate) return_reasons: Vec<String>,
    #[validate(range(min = 1, max = 6, message = "bloom override must be 1-6"))]
    pub(crate) bloom_override: Option<i16>,
    pub(crate) hots_override: Option<HotsTier>,
    pub(crate) boundedness_override: Option<BoundednessTier>,
    #[validate(range(min = 0.0, max = 10.0, message = "difficulty override must be 0-10"))]
    pub(crate) difficulty_override: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewResponse {
    pub(crate) id: String,
    pub(crate) source: QuestionSource,
    pub(crate) question_id: String,
    pub(crate) reviewer_id: String,
    pub(crate) decision: ReviewDecision,
    pub(crate) notes: Option<String>,
    pub(crate) return_reasons: Vec<String>,
    pub(crate) bloom_override: Option<i16>,
    pub(crate) hots_override: Option<HotsTier>,
    pub(crate) boundedness_override: Option<BoundednessTier>,
    pub(crate) difficulty_override: Option<f64>,
    pub(crate) created_at: String,
}

impl From<AdminReview> for ReviewResponse {
    fn from(review: AdminReview) -> Self {
        Self {
            id: review.id,
            source: review.source,
            question_id: review.question_id,
            reviewer_id: review.reviewer_id,
            decision: review.decision,
            notes: review.notes,
            return_reasons: review.return_reasons.0,
            bloom_override: review.bloom_override,
            hots_override: review.hots_override,
            boundedness_override: review.boundedness_override,
            difficulty_override: review.difficulty_override,
            created_at: format_primitive(review.created_at),
        }
    }
}
