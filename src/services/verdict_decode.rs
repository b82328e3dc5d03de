use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db::types::{BoundednessTier, DifficultyLevel, HotsTier};

/// The analyzer's structured report, decoded from its raw text reply.
///
/// Every field the routing rules consume is explicit. Dimensions are
/// optional: a report that omits one still decodes, and the rule engine
/// turns the gap into a maximum-urgency review instead of an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct VerdictReport {
    #[serde(default)]
    pub(crate) bloom_level: Option<i16>,
    #[serde(default)]
    pub(crate) bloom_secondary: Vec<i16>,
    #[serde(default)]
    pub(crate) hots_tier: Option<HotsTier>,
    #[serde(default)]
    pub(crate) boundedness: Option<BoundednessTier>,
    #[serde(default)]
    pub(crate) difficulty_score: Option<f64>,
    #[serde(default)]
    pub(crate) difficulty_label: Option<DifficultyLevel>,
    #[serde(default)]
    pub(crate) clarity_score: Option<f64>,
    #[serde(default)]
    pub(crate) ambiguity_flags: Vec<String>,
    #[serde(default)]
    pub(crate) missing_info_flags: Vec<String>,
    #[serde(default)]
    pub(crate) grade_mismatch_flags: Vec<String>,
    #[serde(default)]
    pub(crate) suggested_edits: Vec<String>,
    #[serde(default)]
    pub(crate) confidence: VerdictConfidence,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub(crate) struct VerdictConfidence {
    #[serde(default)]
    pub(crate) bloom: Option<f64>,
    #[serde(default)]
    pub(crate) hots: Option<f64>,
    #[serde(default)]
    pub(crate) boundedness: Option<f64>,
    #[serde(default)]
    pub(crate) difficulty: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct DecodedVerdict {
    pub(crate) report: VerdictReport,
    /// The full parsed report, kept verbatim for audit and display.
    /// Never branched on.
    pub(crate) raw: Value,
}

#[derive(Debug, Error)]
pub(crate) enum DecodeError {
    #[error("no JSON object found in analyzer output")]
    MissingPayload,
    #[error("analyzer output is not valid JSON: {0}")]
    Syntax(String),
    #[error("analyzer report has an unusable shape: {0}")]
    Shape(String),
}

/// Decode the analyzer's raw reply into a structured verdict.
///
/// The reply often embeds mathematical notation (`\frac{1}{2}`,
/// `x \neq y`) inside JSON strings. Those backslash sequences are not
/// valid JSON escapes, or worse, collide with one (`\f`, `\n`, ...) and
/// would be silently corrupted by a plain parse. The payload is therefore
/// escape-sanitized before parsing.
pub(crate) fn decode_verdict(raw: &str) -> Result<DecodedVerdict, DecodeError> {
    let payload = extract_payload(raw)?;
    let sanitized = sanitize_escapes(payload);

    let value: Value =
        serde_json::from_str(&sanitized).map_err(|err| DecodeError::Syntax(err.to_string()))?;
    let report: VerdictReport =
        serde_json::from_value(value.clone()).map_err(|err| DecodeError::Shape(err.to_string()))?;

    Ok(DecodedVerdict { report, raw: value })
}

/// Strip code-fence markup and, when the reply wraps the report in prose,
/// cut down to the first `{` ... last `}` span.
fn extract_payload(raw: &str) -> Result<&str, DecodeError> {
    let mut text = raw.trim();

    if let Some(stripped) = text.strip_prefix("```") {
        // The opening fence line may carry a language tag ("```json").
        text = stripped.find('\n').map(|idx| &stripped[idx + 1..]).unwrap_or("");
        text = text.trim_end();
        if let Some(body) = text.strip_suffix("```") {
            text = body;
        }
        text = text.trim();
    }

    if text.starts_with('{') || text.starts_with('[') {
        return Ok(text);
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&text[start..=end]),
        _ => Err(DecodeError::MissingPayload),
    }
}

/// The five JSON single-character escapes whose letter also starts common
/// notation commands (`\frac`, `\neq`, `\binom`, `\text`, `\rho`).
const OVERLOADED_ESCAPES: [char; 5] = ['b', 'f', 'n', 'r', 't'];

/// Escape-sanitize `input` so that notation backslashes survive a JSON
/// parse as literal backslashes.
///
/// Outside quoted strings everything is copied verbatim. Inside a string:
/// - `\"`, `\\` and `\/` are valid escapes and kept;
/// - `\u` is kept together with its four following characters;
/// - one of the five overloaded escapes followed by another letter is a
///   notation command, so its backslash is doubled; followed by anything
///   else it is the genuine single-character escape and kept;
/// - every other backslash pair is not a valid JSON escape and the
///   backslash is doubled.
fn sanitize_escapes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let current = chars[i];

        if !in_string {
            if current == '"' {
                in_string = true;
            }
            out.push(current);
            i += 1;
            continue;
        }

        if current == '"' {
            in_string = false;
            out.push(current);
            i += 1;
            continue;
        }

        if current != '\\' {
            out.push(current);
            i += 1;
            continue;
        }

        match chars.get(i + 1) {
            None => {
                // Dangling backslash at end of input.
                out.push_str("\\\\");
                i += 1;
            }
            Some(&next @ ('"' | '\\' | '/')) => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            Some('u') => {
                out.push('\\');
                out.push('u');
                let mut advanced = 2;
                for offset in 2..6 {
                    if let Some(&hex) = chars.get(i + offset) {
                        out.push(hex);
                        advanced += 1;
                    }
                }
                i += advanced;
            }
            Some(&next) if OVERLOADED_ESCAPES.contains(&next) => {
                let notation =
                    chars.get(i + 2).map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
                if notation {
                    out.push_str("\\\\");
                } else {
                    out.push('\\');
                }
                out.push(next);
                i += 2;
            }
            Some(&next) => {
                out.push_str("\\\\");
                out.push(next);
                i += 2;
            }
        }
    }

    out
}
