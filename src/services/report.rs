//! Structured-report grading contract.
//!
//! The model must answer with a single JSON object. Anything that does not parse
//! into the report schema is replaced with an error payload, never partially
//! returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::errors::GradingError;

pub(crate) const INVALID_REPORT_MESSAGE: &str = "Invalid response format from AI model";

pub(crate) const REPORT_SYSTEM_PROMPT: &str = r#"You are a precise university evaluator. Compare the student's answer with the correct answer for every question in the question paper and award marks.

For each question list the strengths of the student's answer, its weaknesses, and concrete suggestions for improvement. Then give the total marks as "awarded/maximum" and a short overall feedback.

Respond with ONLY a single JSON object in exactly this shape:
{
  "summary_report": {
    "total_marks": "<awarded>/<maximum>",
    "overall_feedback": "<overall feedback>"
  },
  "per_question_evaluations": [
    {
      "question": "<question number or title>",
      "marks_awarded": "<awarded>/<maximum>",
      "justifications": {
        "strengths": ["<strength>"],
        "weaknesses": ["<weakness>"],
        "improvement_suggestions": ["<suggestion>"]
      }
    }
  ]
}

Do not add any commentary, explanations, markdown code fences or other text before or after the JSON object."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StructuredReport {
    pub(crate) summary_report: SummaryReport,
    pub(crate) per_question_evaluations: Vec<QuestionEvaluation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SummaryReport {
    pub(crate) total_marks: String,
    pub(crate) overall_feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct QuestionEvaluation {
    pub(crate) question: String,
    pub(crate) marks_awarded: String,
    pub(crate) justifications: Justifications,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Justifications {
    pub(crate) strengths: Vec<String>,
    pub(crate) weaknesses: Vec<String>,
    pub(crate) improvement_suggestions: Vec<String>,
}

/// Either the model's report, passed through as received, or the error payload.
/// Callers check for the `error` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum ReportOutcome {
    Report(Value),
    Invalid { error: String },
}

impl ReportOutcome {
    pub(crate) fn from_model_output(raw: &str) -> Self {
        match validate_report(raw) {
            Ok(report) => Self::Report(report),
            Err(err) => {
                tracing::warn!(error = %err, response_chars = raw.chars().count(), "Rejected model report");
                Self::invalid()
            }
        }
    }

    pub(crate) fn invalid() -> Self {
        Self::Invalid { error: INVALID_REPORT_MESSAGE.to_string() }
    }

    pub(crate) fn is_error(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

/// Parses `raw` as JSON and checks it against the report schema. The parsed value
/// is returned untouched so fields the schema does not name survive.
pub(crate) fn validate_report(raw: &str) -> Result<Value, GradingError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| GradingError::Parse(format!("model output is not JSON: {err}")))?;
    StructuredReport::deserialize(&value)
        .map_err(|err| GradingError::Parse(format!("model output does not match schema: {err}")))?;
    Ok(value)
}
