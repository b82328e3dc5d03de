use serde::Serialize;

use crate::services::publication::ActivationOutcome;

#[derive(Debug, Serialize)]
pub(crate) struct ActivationResponse {
    pub(crate) assessment_id: String,
    pub(crate) outcome: &'static str,
}

impl ActivationResponse {
    pub(crate) fn new(assessment_id: String, outcome: ActivationOutcome) -> Self {
        let outcome = match outcome {
            ActivationOutcome::Published => "published",
            ActivationOutcome::Pending => "pending_approval",
        };
        Self { assessment_id, outcome }
    }
}
