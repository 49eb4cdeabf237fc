use std::path::PathBuf;

use super::parsing::{
    env_optional, env_or_default, is_supported_image_extension, parse_bool, parse_cors_origins,
    parse_environment, parse_grading_contract, parse_string_list, parse_temperature, parse_u32,
    parse_u64,
};
use super::secret::secret_from_env;
use super::types::{
    ConfigError, CorsSettings, GradingSettings, LlmSettings, OcrSettings, RuntimeSettings,
    ServerHost, ServerPort, ServerSettings, Settings, StorageSettings, TelemetrySettings,
};

// Three of these fit in one /grade request body.
const MAX_UPLOAD_SIZE_LIMIT_MB: u64 = 1024;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("GRADER_HOST", "0.0.0.0");
        let port = env_or_default("GRADER_PORT", "8000");

        let environment =
            parse_environment(env_optional("GRADER_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("GRADER_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let vision_api_key = secret_from_env(&["VISION_API_KEY"]);
        let credentials_path = PathBuf::from(env_or_default(
            "GOOGLE_APPLICATION_CREDENTIALS",
            "./key.json",
        ));
        let vision_base_url = env_or_default("VISION_BASE_URL", "https://vision.googleapis.com/v1");
        let ocr_request_timeout =
            parse_u64("OCR_REQUEST_TIMEOUT", env_or_default("OCR_REQUEST_TIMEOUT", "60"))?;

        let llm_api_key = secret_from_env(&["LLM_API_KEY", "GROK_API_KEY"]);
        let llm_base_url = env_or_default("LLM_BASE_URL", "https://api.groq.com/openai/v1");
        let llm_model = env_or_default("LLM_MODEL", "mixtral-8x7b-32768");
        let llm_temperature =
            parse_temperature("LLM_TEMPERATURE", env_or_default("LLM_TEMPERATURE", "0.2"))?;
        let llm_max_tokens =
            parse_u32("LLM_MAX_TOKENS", env_or_default("LLM_MAX_TOKENS", "2048"))?;
        let llm_request_timeout =
            parse_u64("LLM_REQUEST_TIMEOUT", env_or_default("LLM_REQUEST_TIMEOUT", "120"))?;

        let contract = parse_grading_contract(env_optional("GRADING_CONTRACT"))?;

        let max_upload_size_mb =
            parse_u64("MAX_UPLOAD_SIZE_MB", env_or_default("MAX_UPLOAD_SIZE_MB", "10"))?;
        let allowed_image_extensions =
            parse_string_list(env_optional("ALLOWED_IMAGE_EXTENSIONS"), &["jpg", "jpeg", "png"]);

        let log_level = env_or_default("GRADER_LOG_LEVEL", "info");
        let json = env_optional("GRADER_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            cors: CorsSettings { origins: cors_origins },
            ocr: OcrSettings {
                api_key: vision_api_key,
                credentials_path,
                base_url: vision_base_url.trim_end_matches('/').to_string(),
                request_timeout: ocr_request_timeout,
            },
            llm: LlmSettings {
                api_key: llm_api_key,
                base_url: llm_base_url.trim_end_matches('/').to_string(),
                model: llm_model,
                temperature: llm_temperature,
                max_tokens: llm_max_tokens,
                request_timeout: llm_request_timeout,
            },
            grading: GradingSettings { contract },
            storage: StorageSettings { max_upload_size_mb, allowed_image_extensions },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn ocr(&self) -> &OcrSettings {
        &self.ocr
    }

    pub(crate) fn llm(&self) -> &LlmSettings {
        &self.llm
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.allowed_image_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ALLOWED_IMAGE_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }
        for extension in &self.storage.allowed_image_extensions {
            if !is_supported_image_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "ALLOWED_IMAGE_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        if !(1..=MAX_UPLOAD_SIZE_LIMIT_MB).contains(&self.storage.max_upload_size_mb) {
            return Err(ConfigError::InvalidValue {
                field: "MAX_UPLOAD_SIZE_MB",
                value: self.storage.max_upload_size_mb.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if !self.ocr.has_credentials() {
            return Err(ConfigError::MissingSecret(
                "VISION_API_KEY/GOOGLE_APPLICATION_CREDENTIALS",
            ));
        }

        if self.llm.api_key.is_none() {
            return Err(ConfigError::MissingSecret("LLM_API_KEY"));
        }

        Ok(())
    }
}
