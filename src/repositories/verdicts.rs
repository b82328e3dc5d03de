use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::QualityVerdict;
use crate::db::types::{BoundednessTier, DifficultyLevel, HotsTier, QuestionSource};

const COLUMNS: &str = "\
    id, source, question_id, bloom_level, bloom_secondary, hots_tier, boundedness, \
    difficulty_score, difficulty_label, clarity_score, ambiguity_flags, missing_info_flags, \
    grade_mismatch_flags, suggested_edits, bloom_confidence, hots_confidence, \
    boundedness_confidence, difficulty_confidence, review_priority, routing_reasons, \
    report, created_at";

/// A verdict row about to be written. Insert-only: a re-analysis inserts a
/// new row, it never updates an old one.
#[derive(Debug, Clone)]
pub(crate) struct NewVerdict {
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
    pub(crate) bloom_confidence: Option<f64>,
    pub(crate) hots_confidence: Option<f64>,
    pub(crate) boundedness_confidence: Option<f64>,
    pub(crate) difficulty_confidence: Option<f64>,
    pub(crate) review_priority: Option<i32>,
    pub(crate) routing_reasons: Vec<String>,
    pub(crate) report: serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn insert(pool: &PgPool, verdict: NewVerdict) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quality_verdicts (
            id, source, question_id, bloom_level, bloom_secondary, hots_tier, boundedness,
            difficulty_score, difficulty_label, clarity_score, ambiguity_flags,
            missing_info_flags, grade_mismatch_flags, suggested_edits, bloom_confidence,
            hots_confidence, boundedness_confidence, difficulty_confidence, review_priority,
            routing_reasons, report, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22)",
    )
    .bind(&verdict.id)
    .bind(verdict.source)
    .bind(&verdict.question_id)
    .bind(verdict.bloom_level)
    .bind(Json(verdict.bloom_secondary))
    .bind(verdict.hots_tier)
    .bind(verdict.boundedness)
    .bind(verdict.difficulty_score)
    .bind(verdict.difficulty_label)
    .bind(verdict.clarity_score)
    .bind(Json(verdict.ambiguity_flags))
    .bind(Json(verdict.missing_info_flags))
    .bind(Json(verdict.grade_mismatch_flags))
    .bind(Json(verdict.suggested_edits))
    .bind(verdict.bloom_confidence)
    .bind(verdict.hots_confidence)
    .bind(verdict.boundedness_confidence)
    .bind(verdict.difficulty_confidence)
    .bind(verdict.review_priority)
    .bind(Json(verdict.routing_reasons))
    .bind(Json(verdict.report))
    .bind(verdict.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub(crate) async fn latest_by_question(
    pool: &PgPool,
    source: QuestionSource,
    question_id: &str,
) -> Result<Option<QualityVerdict>, sqlx::Error> {
    sqlx::query_as::<_, QualityVerdict>(&format!(
        "SELECT {COLUMNS}
         FROM quality_verdicts
         WHERE source = $1 AND question_id = $2
         ORDER BY created_at DESC
         LIMIT 1"
    ))
    .bind(source)
    .bind(question_id)
    .fetch_optional(pool)
    .await
}
