use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::AdminReview;
use crate::db::types::{BoundednessTier, HotsTier, QuestionSource, ReviewDecision};

const COLUMNS: &str = "\
    id, source, question_id, reviewer_id, decision, notes, return_reasons, \
    bloom_override, hots_override, boundedness_override, difficulty_override, created_at";

#[derive(Debug, Clone)]
pub(crate) struct NewAdminReview {
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
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(
    pool: &PgPool,
    review: NewAdminReview,
) -> Result<AdminReview, sqlx::Error> {
    sqlx::query_as::<_, AdminReview>(&format!(
        "INSERT INTO admin_reviews (
            id, source, question_id, reviewer_id, decision, notes, return_reasons,
            bloom_override, hots_override, boundedness_override, difficulty_override, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
        RETURNING {COLUMNS}"
    ))
    .bind(&review.id)
    .bind(review.source)
    .bind(&review.question_id)
    .bind(&review.reviewer_id)
    .bind(review.decision)
    .bind(&review.notes)
    .bind(Json(review.return_reasons.clone()))
    .bind(review.bloom_override)
    .bind(review.hots_override)
    .bind(review.boundedness_override)
    .bind(review.difficulty_override)
    .bind(review.created_at)
    .fetch_one(pool)
    .await
}
