use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;
use crate::db::models::Question;
use crate::db::types::QuestionKind;
use crate::services::verdict_decode::{self, DecodedVerdict};

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an assessment-quality expert reviewing a teacher-authored question before it reaches students.

Judge four dimensions:
1. Bloom level (1-6) of the cognitive demand, with secondary candidates when borderline.
2. Higher-order-thinking strength tier: H0 (pure recall) to H3 (strongly higher-order).
3. Boundedness of the expected answer scope: B0 (unbounded) to B3 (fully bounded).
4. Difficulty on a 0-10 scale.

Also report a clarity score (0-100), any ambiguity, missing-information or grade-level-mismatch flags, and concrete suggested edits. Mathematical notation in your text must use LaTeX commands.

Reply with exactly one JSON object:
{
  "bloom_level": <1-6>,
  "bloom_secondary": [<1-6>, ...],
  "hots_tier": "H0"|"H1"|"H2"|"H3",
  "boundedness": "B0"|"B1"|"B2"|"B3",
  "difficulty_score": <0-10>,
  "difficulty_label": "easy"|"medium"|"hard",
  "clarity_score": <0-100>,
  "ambiguity_flags": ["..."],
  "missing_info_flags": ["..."],
  "grade_mismatch_flags": ["..."],
  "suggested_edits": ["..."],
  "confidence": {"bloom": <0-1>, "hots": <0-1>, "boundedness": <0-1>, "difficulty": <0-1>}
}
"#;

#[derive(Debug, Error)]
pub(crate) enum AnalysisError {
    /// Network failure, non-success status or empty reply from the analyzer.
    #[error("analyzer provider failure: {0}")]
    Provider(String),
    /// The analyzer replied but the reply could not be decoded into a
    /// verdict even after escape sanitization. Carries the raw text for
    /// diagnostics.
    #[error("malformed analyzer response: {reason}")]
    Malformed { reason: String, raw: String },
}

/// External content-quality analyzer. One synchronous attempt per call;
/// retry policy belongs to the caller.
#[async_trait]
pub(crate) trait QualityAnalyzer: Send + Sync {
    async fn analyze(&self, question: &Question) -> Result<DecodedVerdict, AnalysisError>;
}

#[derive(Debug, Clone)]
pub(crate) struct LlmQualityAnalyzer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl LlmQualityAnalyzer {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let analyzer = settings.analyzer();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(analyzer.request_timeout))
            .build()
            .map_err(|err| anyhow::anyhow!(err).context("Failed to build HTTP client"))?;

        Ok(Self {
            client,
            api_key: analyzer.api_key.clone(),
            base_url: analyzer.base_url.trim_end_matches('/').to_string(),
            model: analyzer.model.clone(),
            max_tokens: analyzer.max_tokens,
            temperature: analyzer.temperature,
        })
    }

    fn build_user_prompt(question: &Question) -> String {
        let kind = match question.kind {
            QuestionKind::MultipleChoice => "multiple choice",
            QuestionKind::Essay => "essay",
        };

        let mut prompt = format!(
            "Subject: {}\nGrade band: {}\nQuestion type: {}\n\nQuestion text:\n{}\n",
            question.subject, question.grade_band, kind, question.content
        );

        if !question.options.0.is_empty() {
            prompt.push_str("\nAnswer options:\n");
            for (idx, option) in question.options.0.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", idx + 1, option));
            }
        }

        if let Some(answer) = question.correct_answer.as_deref() {
            prompt.push_str(&format!("\nDeclared correct answer: {answer}\n"));
        }

        prompt.push_str(&format!(
            "\nTeacher-declared difficulty: {:?}\nTeacher claims higher-order thinking: {}\n",
            question.declared_difficulty, question.claims_hots
        ));

        prompt
    }
}

#[async_trait]
impl QualityAnalyzer for LlmQualityAnalyzer {
    async fn analyze(&self, question: &Question) -> Result<DecodedVerdict, AnalysisError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": ANALYSIS_SYSTEM_PROMPT},
                {"role": "user", "content": Self::build_user_prompt(question)}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AnalysisError::Provider(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Provider(format!("analyzer returned {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| AnalysisError::Provider(format!("unreadable response body: {err}")))?;

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .unwrap_or("");

        if content.trim().is_empty() {
            return Err(AnalysisError::Provider("empty response content".to_string()));
        }

        verdict_decode::decode_verdict(content).map_err(|err| AnalysisError::Malformed {
            reason: err.to_string(),
            raw: content.to_string(),
        })
    }
}
