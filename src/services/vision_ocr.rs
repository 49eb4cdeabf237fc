use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::core::config::{SecretString, Settings};
use crate::services::errors::{decode_json_body, GradingError};

/// Returned in place of an error when the image has no text regions.
pub(crate) const NO_TEXT_DETECTED: &str = "No text detected in the image.";

const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Sends one `images:annotate` request body and returns the decoded response body.
#[async_trait]
pub(crate) trait VisionTransport: Send + Sync {
    async fn annotate(&self, payload: &Value) -> Result<Value, GradingError>;
}

#[derive(Clone)]
pub(crate) struct TextExtractor {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Ready(Arc<dyn VisionTransport>),
    Unconfigured(String),
}

impl TextExtractor {
    pub(crate) fn new(transport: Arc<dyn VisionTransport>) -> Self {
        Self { backend: Backend::Ready(transport) }
    }

    /// An extractor that fails every call with a configuration error.
    pub(crate) fn unconfigured(reason: impl Into<String>) -> Self {
        Self { backend: Backend::Unconfigured(reason.into()) }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, GradingError> {
        let transport = GoogleVisionTransport::from_settings(settings)?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub(crate) fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    pub(crate) async fn extract_text(&self, image: &[u8]) -> Result<String, GradingError> {
        let transport = match &self.backend {
            Backend::Ready(transport) => transport,
            Backend::Unconfigured(reason) => {
                return Err(GradingError::Configuration(reason.clone()));
            }
        };

        if image.is_empty() {
            return Err(GradingError::InvalidInput("image payload is empty".to_string()));
        }

        let digest = hex::encode(Sha256::digest(image));
        let timer = Instant::now();
        let result =
            transport.annotate(&annotate_payload(image)).await.and_then(|body| detected_text(&body));
        let elapsed = timer.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        metrics::counter!("ocr_requests_total", "outcome" => outcome).increment(1);
        metrics::histogram!("ocr_request_duration_seconds").record(elapsed);

        match &result {
            Ok(text) => tracing::info!(
                image_bytes = image.len(),
                image_sha256 = %digest,
                detected_chars = text.chars().count(),
                duration_seconds = elapsed,
                "Text extracted"
            ),
            Err(err) => tracing::warn!(
                image_bytes = image.len(),
                image_sha256 = %digest,
                error = %err,
                retryable = err.is_retryable(),
                "Text extraction failed"
            ),
        }

        result
    }
}

fn annotate_payload(image: &[u8]) -> Value {
    json!({
        "requests": [{
            "image": {"content": STANDARD.encode(image)},
            "features": [{"type": "TEXT_DETECTION"}]
        }]
    })
}

/// First text region of the first response, or the sentinel when there is none.
fn detected_text(body: &Value) -> Result<String, GradingError> {
    let response = body
        .get("responses")
        .and_then(Value::as_array)
        .and_then(|responses| responses.first())
        .ok_or_else(|| GradingError::Parse("OCR response has no `responses` entry".to_string()))?;

    if let Some(message) = response
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
    {
        return Err(GradingError::Service(message.to_string()));
    }

    let text = response
        .get("textAnnotations")
        .and_then(Value::as_array)
        .and_then(|annotations| annotations.first())
        .and_then(|annotation| annotation.get("description"))
        .and_then(Value::as_str);

    Ok(text.unwrap_or(NO_TEXT_DETECTED).to_string())
}

pub(crate) struct GoogleVisionTransport {
    client: Client,
    endpoint: String,
    auth: VisionAuth,
}

enum VisionAuth {
    ApiKey(SecretString),
    ServiceAccount(ServiceAccountAuth),
}

impl GoogleVisionTransport {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, GradingError> {
        let ocr = settings.ocr();
        let auth = match &ocr.api_key {
            Some(key) => VisionAuth::ApiKey(key.clone()),
            None => VisionAuth::ServiceAccount(ServiceAccountAuth::from_file(&ocr.credentials_path)?),
        };

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(ocr.request_timeout))
            .build()
            .map_err(|err| {
                GradingError::Configuration(format!("Failed to build Vision HTTP client: {err}"))
            })?;

        Ok(Self { client, endpoint: format!("{}/images:annotate", ocr.base_url), auth })
    }
}

#[async_trait]
impl VisionTransport for GoogleVisionTransport {
    async fn annotate(&self, payload: &Value) -> Result<Value, GradingError> {
        let request = self.client.post(&self.endpoint).json(payload);
        let request = match &self.auth {
            VisionAuth::ApiKey(key) => request.query(&[("key", key.expose())]),
            VisionAuth::ServiceAccount(account) => {
                request.bearer_auth(account.access_token(&self.client).await?)
            }
        };

        let response =
            request.send().await.map_err(|err| GradingError::transport("Google Vision", err))?;
        let status = response.status();
        let raw_body =
            response.text().await.map_err(|err| GradingError::transport("Google Vision", err))?;

        decode_json_body(status, &raw_body, "Google Vision")
    }
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

struct ServiceAccountAuth {
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    fn from_file(path: &Path) -> Result<Self, GradingError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GradingError::Configuration(format!(
                "Failed to initialize Google Vision API client: cannot read {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json(&raw)
    }

    fn from_json(raw: &str) -> Result<Self, GradingError> {
        let key: ServiceAccountKey = serde_json::from_str(raw).map_err(|err| {
            GradingError::Configuration(format!(
                "Failed to initialize Google Vision API client: invalid service account key: {err}"
            ))
        })?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|err| {
            GradingError::Configuration(format!(
                "Failed to initialize Google Vision API client: invalid private key: {err}"
            ))
        })?;

        Ok(Self {
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    async fn access_token(&self, client: &Client) -> Result<String, GradingError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| Instant::now() < token.refresh_at) {
            return Ok(token.value.clone());
        }

        let issued_at = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: VISION_SCOPE,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
                .map_err(|err| {
                    GradingError::Configuration(format!("Failed to sign token assertion: {err}"))
                })?;

        let response = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|err| GradingError::transport("Google OAuth", err))?;
        let status = response.status();
        let raw_body =
            response.text().await.map_err(|err| GradingError::transport("Google OAuth", err))?;
        let body = decode_json_body(status, &raw_body, "Google OAuth")?;
        let token: TokenResponse = serde_json::from_value(body).map_err(|err| {
            GradingError::Parse(format!("Google OAuth token response is malformed: {err}"))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        tracing::debug!(expires_in = token.expires_in, "Obtained Vision access token");
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}
