use serde::Serialize;

use crate::db::types::{BoundednessTier, DifficultyLevel, HotsTier};
use crate::services::verdict_decode::{VerdictConfidence, VerdictReport};

/// A dimension judged below this confidence goes to a human.
pub(crate) const MIN_DIMENSION_CONFIDENCE: f64 = 0.75;
/// Clarity scores below this are not auto-approvable.
pub(crate) const MIN_CLARITY_SCORE: f64 = 60.0;

// Reason priorities; lower means reviewed first.
const PRIORITY_VIOLATION: i32 = 0;
const PRIORITY_UNBOUNDED: i32 = 1;
const PRIORITY_QUALITY_FLAG: i32 = 2;
const PRIORITY_LOW_CONFIDENCE: i32 = 3;
const PRIORITY_CLAIM_MISMATCH: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RoutingAction {
    AutoApprove,
    AdminReview,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RoutingReason {
    pub(crate) code: &'static str,
    pub(crate) message: String,
    pub(crate) priority: i32,
}

/// Outcome of routing one verdict. Derived, never persisted as its own
/// entity; the lifecycle service stamps `priority()` and the reason
/// messages onto the verdict row as a sort key for the review queue.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RoutingDecision {
    pub(crate) action: RoutingAction,
    /// Ranked most urgent first; empty exactly when auto-approved.
    pub(crate) reasons: Vec<RoutingReason>,
}

impl RoutingDecision {
    fn from_reasons(mut reasons: Vec<RoutingReason>) -> Self {
        reasons.sort_by_key(|reason| reason.priority);
        let action = if reasons.is_empty() {
            RoutingAction::AutoApprove
        } else {
            RoutingAction::AdminReview
        };
        Self { action, reasons }
    }

    /// Review urgency; `None` when auto-approved.
    pub(crate) fn priority(&self) -> Option<i32> {
        self.reasons.iter().map(|reason| reason.priority).min()
    }

    pub(crate) fn reason_messages(&self) -> Vec<String> {
        self.reasons.iter().map(|reason| reason.message.clone()).collect()
    }
}

/// Route a decoded verdict to auto-approval or human review.
///
/// Total over every decodable report: a verdict with missing or
/// out-of-range dimensions is routed to review at maximum urgency rather
/// than rejected, since misrouting toward more scrutiny is always safe.
pub(crate) fn route(
    report: &VerdictReport,
    declared_difficulty: DifficultyLevel,
    claims_hots: bool,
) -> RoutingDecision {
    let validated = match validate(report) {
        Ok(validated) => validated,
        Err(violations) => return RoutingDecision::from_reasons(violations),
    };

    let mut reasons = Vec::new();

    if validated.boundedness == BoundednessTier::B0 {
        reasons.push(RoutingReason {
            code: "unbounded_scope",
            message: "expected answer scope is unbounded (B0)".to_string(),
            priority: PRIORITY_UNBOUNDED,
        });
    }

    if validated.clarity_score < MIN_CLARITY_SCORE {
        reasons.push(RoutingReason {
            code: "low_clarity",
            message: format!(
                "clarity score {:.0} is below the auto-approve floor of {:.0}",
                validated.clarity_score, MIN_CLARITY_SCORE
            ),
            priority: PRIORITY_QUALITY_FLAG,
        });
    }

    for flag in &report.ambiguity_flags {
        reasons.push(RoutingReason {
            code: "ambiguity",
            message: format!("ambiguity: {flag}"),
            priority: PRIORITY_QUALITY_FLAG,
        });
    }

    for flag in &report.missing_info_flags {
        reasons.push(RoutingReason {
            code: "missing_info",
            message: format!("missing information: {flag}"),
            priority: PRIORITY_QUALITY_FLAG,
        });
    }

    for flag in &report.grade_mismatch_flags {
        reasons.push(RoutingReason {
            code: "grade_mismatch",
            message: format!("grade-level mismatch: {flag}"),
            priority: PRIORITY_QUALITY_FLAG,
        });
    }

    for (dimension, confidence) in validated.confidences {
        if confidence < MIN_DIMENSION_CONFIDENCE {
            reasons.push(RoutingReason {
                code: "low_confidence",
                message: format!(
                    "{dimension} confidence {confidence:.2} is below {MIN_DIMENSION_CONFIDENCE}"
                ),
                priority: PRIORITY_LOW_CONFIDENCE,
            });
        }
    }

    if claims_hots && validated.hots_tier <= HotsTier::H1 {
        reasons.push(RoutingReason {
            code: "hots_claim_mismatch",
            message: format!(
                "teacher claims higher-order thinking but the analyzer rated it {:?}",
                validated.hots_tier
            ),
            priority: PRIORITY_CLAIM_MISMATCH,
        });
    }

    let scored_difficulty = DifficultyLevel::from_score(validated.difficulty_score);
    let opposite_band = matches!(
        (declared_difficulty, scored_difficulty),
        (DifficultyLevel::Easy, DifficultyLevel::Hard)
            | (DifficultyLevel::Hard, DifficultyLevel::Easy)
    );
    if opposite_band {
        reasons.push(RoutingReason {
            code: "difficulty_claim_mismatch",
            message: format!(
                "teacher declared {declared_difficulty:?} but the analyzer scored {:.1} ({scored_difficulty:?})",
                validated.difficulty_score
            ),
            priority: PRIORITY_CLAIM_MISMATCH,
        });
    }

    RoutingDecision::from_reasons(reasons)
}

struct ValidatedReport {
    hots_tier: HotsTier,
    boundedness: BoundednessTier,
    difficulty_score: f64,
    clarity_score: f64,
    confidences: [(&'static str, f64); 4],
}

fn validate(report: &VerdictReport) -> Result<ValidatedReport, Vec<RoutingReason>> {
    let mut violations = Vec::new();

    match report.bloom_level {
        Some(level) if (1..=6).contains(&level) => {}
        Some(level) => violation(&mut violations, format!("bloom level {level} is out of range")),
        None => violation(&mut violations, "bloom level is missing".to_string()),
    }

    if report.hots_tier.is_none() {
        violation(&mut violations, "HOTS tier is missing".to_string());
    }

    if report.boundedness.is_none() {
        violation(&mut violations, "boundedness tier is missing".to_string());
    }

    match report.difficulty_score {
        Some(score) if (0.0..=10.0).contains(&score) => {}
        Some(score) => {
            violation(&mut violations, format!("difficulty score {score} is out of range"))
        }
        None => violation(&mut violations, "difficulty score is missing".to_string()),
    }

    match report.clarity_score {
        Some(score) if (0.0..=100.0).contains(&score) => {}
        Some(score) => violation(&mut violations, format!("clarity score {score} is out of range")),
        None => violation(&mut violations, "clarity score is missing".to_string()),
    }

    let confidences = confidence_entries(&report.confidence);
    for (dimension, confidence) in confidences {
        match confidence {
            Some(value) if (0.0..=1.0).contains(&value) => {}
            Some(value) => violation(
                &mut violations,
                format!("{dimension} confidence {value} is out of range"),
            ),
            None => violation(&mut violations, format!("{dimension} confidence is missing")),
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    // All fields checked present just above.
    let validated = match (
        report.hots_tier,
        report.boundedness,
        report.difficulty_score,
        report.clarity_score,
        report.confidence.bloom,
        report.confidence.hots,
        report.confidence.boundedness,
        report.confidence.difficulty,
    ) {
        (
            Some(hots_tier),
            Some(boundedness),
            Some(difficulty_score),
            Some(clarity_score),
            Some(bloom_confidence),
            Some(hots_confidence),
            Some(boundedness_confidence),
            Some(difficulty_confidence),
        ) => ValidatedReport {
            hots_tier,
            boundedness,
            difficulty_score,
            clarity_score,
            confidences: [
                ("bloom", bloom_confidence),
                ("hots", hots_confidence),
                ("boundedness", boundedness_confidence),
                ("difficulty", difficulty_confidence),
            ],
        },
        _ => {
            return Err(vec![RoutingReason {
                code: "verdict_violation",
                message: "verdict shape could not be classified".to_string(),
                priority: PRIORITY_VIOLATION,
            }])
        }
    };

    Ok(validated)
}

fn violation(violations: &mut Vec<RoutingReason>, message: String) {
    violations.push(RoutingReason {
        code: "verdict_violation",
        message,
        priority: PRIORITY_VIOLATION,
    });
}

fn confidence_entries(confidence: &VerdictConfidence) -> [(&'static str, Option<f64>); 4] {
    [
        ("bloom", confidence.bloom),
        ("hots", confidence.hots),
        ("boundedness", confidence.boundedness),
        ("difficulty", confidence.difficulty),
    ]
}
