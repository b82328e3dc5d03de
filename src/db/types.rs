use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "questionsource", rename_all = "lowercase")]
pub(crate) enum QuestionSource {
    Bank,
    Quiz,
    Exam,
}

impl QuestionSource {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "bank" => Some(Self::Bank),
            "quiz" => Some(Self::Quiz),
            "exam" => Some(Self::Exam),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Quiz => "quiz",
            Self::Exam => "exam",
        }
    }
}

/// Lifecycle states of a question. Only the lifecycle service transitions
/// between them, always through conditional updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questionstatus", rename_all = "snake_case")]
pub(crate) enum QuestionStatus {
    Draft,
    Analyzing,
    Approved,
    AdminReview,
    Returned,
    Archived,
}

impl QuestionStatus {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "analyzing" => Some(Self::Analyzing),
            "approved" => Some(Self::Approved),
            "admin_review" => Some(Self::AdminReview),
            "returned" => Some(Self::Returned),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questionkind", rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    MultipleChoice,
    Essay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "difficultylevel", rename_all = "lowercase")]
pub(crate) enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    /// Coarse label for a 0-10 difficulty score.
    pub(crate) fn from_score(score: f64) -> Self {
        if score < 4.0 {
            Self::Easy
        } else if score <= 7.0 {
            Self::Medium
        } else {
            Self::Hard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "assessmentkind", rename_all = "lowercase")]
pub(crate) enum AssessmentKind {
    Quiz,
    Exam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "reviewdecision", rename_all = "lowercase")]
pub(crate) enum ReviewDecision {
    Approve,
    Return,
    Archive,
}

/// Higher-order-thinking strength tier reported by the analyzer,
/// H0 (pure recall) through H3 (strongly higher-order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[sqlx(type_name = "hotstier", rename_all = "lowercase")]
pub(crate) enum HotsTier {
    H0,
    H1,
    H2,
    H3,
}

/// How well-bounded the expected answer scope is, B0 (unbounded) through
/// B3 (fully bounded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[sqlx(type_name = "boundednesstier", rename_all = "lowercase")]
pub(crate) enum BoundednessTier {
    B0,
    B1,
    B2,
    B3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notificationkind", rename_all = "snake_case")]
pub(crate) enum NotificationKind {
    ReviewRequested,
    QuestionApproved,
    QuestionReturned,
    AssessmentPublished,
}
