use uuid::Uuid;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Assessment, Question};
use crate::db::types::NotificationKind;
use crate::repositories::NewNotification;

/// Insert notification rows for the delivery collaborator to pick up.
/// Fire-and-forget: a failure here is logged and never affects the
/// pipeline state that triggered it.
pub(crate) async fn deliver(state: &AppState, notifications: Vec<NewNotification>) {
    if notifications.is_empty() {
        return;
    }

    let count = notifications.len();
    if let Err(err) = state.store().insert_notifications(notifications).await {
        tracing::error!(error = %err, count, "Failed to insert notifications");
    }
}

/// A question landed in the review queue: the owning teacher and every
/// administrator get the routing reasons.
pub(crate) fn review_requested(
    question: &Question,
    reasons: &[String],
    admin_ids: &[String],
) -> Vec<NewNotification> {
    let title = "Question needs review".to_string();
    let body = format!(
        "\"{}\" was routed to admin review: {}",
        snippet(&question.content),
        reasons.join("; ")
    );
    let link = question_link(question);

    let mut recipients = vec![question.teacher_id.clone()];
    recipients.extend(admin_ids.iter().filter(|id| **id != question.teacher_id).cloned());

    recipients
        .into_iter()
        .map(|recipient_id| NewNotification {
            id: Uuid::new_v4().to_string(),
            recipient_id,
            kind: NotificationKind::ReviewRequested,
            title: title.clone(),
            body: body.clone(),
            link: Some(link.clone()),
            created_at: primitive_now_utc(),
        })
        .collect()
}

pub(crate) fn question_approved(question: &Question) -> Vec<NewNotification> {
    vec![NewNotification {
        id: Uuid::new_v4().to_string(),
        recipient_id: question.teacher_id.clone(),
        kind: NotificationKind::QuestionApproved,
        title: "Question approved".to_string(),
        body: format!("\"{}\" passed review and is approved.", snippet(&question.content)),
        link: Some(question_link(question)),
        created_at: primitive_now_utc(),
    }]
}

pub(crate) fn question_returned(question: &Question, reasons: &[String]) -> Vec<NewNotification> {
    let body = if reasons.is_empty() {
        format!("\"{}\" was returned for rework.", snippet(&question.content))
    } else {
        format!(
            "\"{}\" was returned for rework: {}",
            snippet(&question.content),
            reasons.join("; ")
        )
    };

    vec![NewNotification {
        id: Uuid::new_v4().to_string(),
        recipient_id: question.teacher_id.clone(),
        kind: NotificationKind::QuestionReturned,
        title: "Question returned".to_string(),
        body,
        link: Some(question_link(question)),
        created_at: primitive_now_utc(),
    }]
}

/// Publish fan-out: the owning teacher plus every currently enrolled
/// student of the assessment's class.
pub(crate) fn assessment_published(
    assessment: &Assessment,
    student_ids: &[String],
) -> Vec<NewNotification> {
    let title = format!("{} is now available", assessment.title);
    let body = format!(
        "All questions in \"{}\" were approved and it has been published.",
        assessment.title
    );
    let link = format!("/assessments/{}", assessment.id);

    let mut recipients = vec![assessment.teacher_id.clone()];
    recipients.extend(student_ids.iter().cloned());

    recipients
        .into_iter()
        .map(|recipient_id| NewNotification {
            id: Uuid::new_v4().to_string(),
            recipient_id,
            kind: NotificationKind::AssessmentPublished,
            title: title.clone(),
            body: body.clone(),
            link: Some(link.clone()),
            created_at: primitive_now_utc(),
        })
        .collect()
}

fn question_link(question: &Question) -> String {
    format!("/questions/{}/{}", question.source.as_str(), question.id)
}

fn snippet(content: &str) -> String {
    const MAX: usize = 80;
    if content.chars().count() <= MAX {
        content.to_string()
    } else {
        let cut: String = content.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
