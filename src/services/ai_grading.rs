use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::config::{GradingContract, SecretString, Settings};
use crate::services::errors::{decode_json_body, GradingError};
use crate::services::report::{ReportOutcome, REPORT_SYSTEM_PROMPT};
use crate::services::scoring::{ScoringRubric, WeightedEvaluation};

/// The three texts a grade is computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GradingRequest {
    question_text: String,
    model_answer_text: String,
    student_answer_text: String,
}

impl GradingRequest {
    pub(crate) fn new(
        question_text: impl Into<String>,
        model_answer_text: impl Into<String>,
        student_answer_text: impl Into<String>,
    ) -> Result<Self, GradingError> {
        let request = Self {
            question_text: question_text.into(),
            model_answer_text: model_answer_text.into(),
            student_answer_text: student_answer_text.into(),
        };

        for (field, value) in [
            ("question", &request.question_text),
            ("correct_answer", &request.model_answer_text),
            ("student_answer", &request.student_answer_text),
        ] {
            if value.trim().is_empty() {
                return Err(GradingError::InvalidInput(format!("{field} text is empty")));
            }
        }

        Ok(request)
    }

    pub(crate) fn question_text(&self) -> &str {
        &self.question_text
    }

    pub(crate) fn model_answer_text(&self) -> &str {
        &self.model_answer_text
    }

    pub(crate) fn student_answer_text(&self) -> &str {
        &self.student_answer_text
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum EvaluationResult {
    WeightedScore(WeightedEvaluation),
    Report(ReportOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: ChatRole,
    pub(crate) content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChatRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) temperature: f64,
    pub(crate) max_tokens: u32,
    pub(crate) json_response: bool,
}

/// One chat completion round-trip. Returns the completion text.
#[async_trait]
pub(crate) trait ChatTransport: Send + Sync {
    async fn complete(
        &self,
        api_key: &SecretString,
        request: &ChatRequest,
    ) -> Result<String, GradingError>;
}

#[derive(Clone)]
pub(crate) struct AiGradingService {
    transport: Arc<dyn ChatTransport>,
    api_key: Option<SecretString>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    contract: GradingContract,
    rubric: ScoringRubric,
}

impl AiGradingService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, GradingError> {
        let transport = OpenAiChatTransport::from_settings(settings)?;
        Self::new(Arc::new(transport), settings)
    }

    pub(crate) fn new(
        transport: Arc<dyn ChatTransport>,
        settings: &Settings,
    ) -> Result<Self, GradingError> {
        Ok(Self {
            transport,
            api_key: settings.llm().api_key.clone(),
            model: settings.llm().model.clone(),
            temperature: settings.llm().temperature,
            max_tokens: settings.llm().max_tokens,
            contract: settings.grading().contract,
            rubric: ScoringRubric::standard()?,
        })
    }

    pub(crate) fn contract(&self) -> GradingContract {
        self.contract
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub(crate) async fn evaluate(
        &self,
        request: &GradingRequest,
    ) -> Result<EvaluationResult, GradingError> {
        let Some(api_key) = &self.api_key else {
            return Err(GradingError::Configuration(
                "LLM_API_KEY environment variable is not set".to_string(),
            ));
        };

        let chat = self.chat_request(request);
        tracing::info!(
            model = %self.model,
            contract = self.contract.as_str(),
            "Sending AI grading request"
        );

        let timer = Instant::now();
        let completion = self.transport.complete(api_key, &chat).await;
        let elapsed = timer.elapsed().as_secs_f64();

        let outcome = match &completion {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("llm_requests_total", "outcome" => outcome).increment(1);
        metrics::histogram!("llm_request_duration_seconds").record(elapsed);

        let content = completion.inspect_err(|err| {
            tracing::warn!(
                error = %err,
                retryable = err.is_retryable(),
                duration_seconds = elapsed,
                "AI grading request failed"
            );
        })?;

        let result = match self.contract {
            GradingContract::WeightedScore => {
                EvaluationResult::WeightedScore(self.rubric.evaluate(&content))
            }
            GradingContract::StructuredReport => {
                let outcome = ReportOutcome::from_model_output(&content);
                if outcome.is_error() {
                    metrics::counter!("llm_rejected_reports_total").increment(1);
                }
                EvaluationResult::Report(outcome)
            }
        };

        tracing::info!(duration_seconds = elapsed, "AI grading completed");

        Ok(result)
    }

    fn chat_request(&self, request: &GradingRequest) -> ChatRequest {
        let (system_prompt, json_response) = match self.contract {
            GradingContract::WeightedScore => (self.rubric.system_prompt(), false),
            GradingContract::StructuredReport => (REPORT_SYSTEM_PROMPT.to_string(), true),
        };

        let message = |role, content: String| ChatMessage { role, content };
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                message(ChatRole::System, system_prompt),
                message(ChatRole::User, format!("Question: {}", request.question_text())),
                message(ChatRole::User, format!("Correct Answer: {}", request.model_answer_text())),
                message(
                    ChatRole::User,
                    format!("Student's Answer: {}", request.student_answer_text()),
                ),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_response,
        }
    }
}

/// `POST {base}/chat/completions` against any OpenAI-compatible endpoint.
pub(crate) struct OpenAiChatTransport {
    client: Client,
    endpoint: String,
}

impl OpenAiChatTransport {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, GradingError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(settings.llm().request_timeout))
            .build()
            .map_err(|err| {
                GradingError::Configuration(format!("Failed to build LLM HTTP client: {err}"))
            })?;

        Ok(Self { client, endpoint: format!("{}/chat/completions", settings.llm().base_url) })
    }
}

#[async_trait]
impl ChatTransport for OpenAiChatTransport {
    async fn complete(
        &self,
        api_key: &SecretString,
        request: &ChatRequest,
    ) -> Result<String, GradingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose())
            .json(&completion_payload(request))
            .send()
            .await
            .map_err(|err| GradingError::transport("LLM", err))?;

        let status = response.status();
        let raw_body = response.text().await.map_err(|err| GradingError::transport("LLM", err))?;
        let body = decode_json_body(status, &raw_body, "LLM")?;
        completion_content(&body)
    }
}

fn completion_payload(request: &ChatRequest) -> Value {
    let mut payload = json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    });
    if request.json_response {
        payload["response_format"] = json!({"type": "json_object"});
    }
    payload
}

fn completion_content(body: &Value) -> Result<String, GradingError> {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| GradingError::Service("LLM response is missing completion content".to_string()))
}
