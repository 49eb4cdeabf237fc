use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy shared by the OCR adapter and the grading orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum GradingError {
    /// Missing or unusable credential. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The upstream service reported a failure; carries its message verbatim.
    #[error("upstream service error: {0}")]
    Service(String),
    /// Transport failure. Callers may retry.
    #[error("transient error: {0}")]
    Transient(String),
    #[error("unexpected response format: {0}")]
    Parse(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GradingError {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Service(_) => "service",
            Self::Transient(_) => "transient",
            Self::Parse(_) => "parse",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn transport(service: &str, err: reqwest::Error) -> Self {
        Self::Transient(format!("{service} request failed: {err}"))
    }
}

/// Pulls a human readable message out of an upstream error body.
///
/// Handles `{"error": {"message": ..}}` (Google, OpenAI), `{"error": ".."}` with an
/// optional `error_description` (OAuth), and bare `message` / `detail` fields.
pub(crate) fn upstream_message(payload: &Value) -> Option<String> {
    if let Some(error) = payload.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        if let Some(code) = error.as_str() {
            let description = payload.get("error_description").and_then(Value::as_str);
            return Some(match description {
                Some(description) => format!("{code}: {description}"),
                None => code.to_string(),
            });
        }
    }

    payload
        .get("message")
        .or_else(|| payload.get("detail"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Non-2xx is a service error carrying the upstream message; a 2xx body that is
/// not JSON is a parse error.
pub(crate) fn decode_json_body(
    status: StatusCode,
    raw_body: &str,
    service: &str,
) -> Result<Value, GradingError> {
    let parsed = serde_json::from_str::<Value>(raw_body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|body| upstream_message(&body))
            .unwrap_or_else(|| format!("{service} returned status {status}"));
        return Err(GradingError::Service(message));
    }

    parsed.map_err(|err| {
        GradingError::Parse(format!("{service} returned non-JSON body (status {status}): {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upstream_message_variants() {
        assert_eq!(
            upstream_message(&json!({"error": {"code": 400, "message": "Bad image data."}})),
            Some("Bad image data.".to_string())
        );
        assert_eq!(
            upstream_message(&json!({"error": "invalid_grant", "error_description": "Invalid JWT"})),
            Some("invalid_grant: Invalid JWT".to_string())
        );
        assert_eq!(upstream_message(&json!({"detail": "nope"})), Some("nope".to_string()));
        assert_eq!(upstream_message(&json!({"status": "ok"})), None);
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(GradingError::Transient("reset".into()).is_retryable());
        assert!(!GradingError::Service("quota".into()).is_retryable());
        assert!(!GradingError::Configuration("no key".into()).is_retryable());
    }

    #[test]
    fn error_status_uses_upstream_message() {
        let body = r#"{"error": {"code": 403, "message": "Cloud Vision API has not been used"}}"#;
        let err = decode_json_body(StatusCode::FORBIDDEN, body, "Google Vision").expect_err("403");
        assert_eq!(err, GradingError::Service("Cloud Vision API has not been used".to_string()));

        let err = decode_json_body(StatusCode::BAD_GATEWAY, "<html>", "Google Vision")
            .expect_err("502");
        assert!(matches!(err, GradingError::Service(ref msg) if msg.contains("502")));
    }

    #[test]
    fn success_status_with_non_json_body_is_parse_error() {
        let err = decode_json_body(StatusCode::OK, "<html>maintenance</html>", "LLM")
            .expect_err("html body");
        assert!(matches!(err, GradingError::Parse(ref msg) if msg.starts_with("LLM returned non-JSON")));

        let body = decode_json_body(StatusCode::OK, r#"{"choices": []}"#, "LLM").expect("json body");
        assert_eq!(body["choices"], json!([]));
    }
}
