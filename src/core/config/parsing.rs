use std::env;

use super::types::{ConfigError, Environment, GradingContract};

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_temperature(field: &'static str, value: String) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(parsed) if (0.0..=2.0).contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

/// Accepts a JSON array or a comma separated list. `*` or nothing means any origin.
pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(Vec::new());
    };

    let items: Vec<String> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?
    } else {
        raw.split(',').map(|item| item.trim().to_string()).collect()
    };

    Ok(items.into_iter().filter(|item| !item.is_empty() && item != "*").collect())
}

pub(super) fn parse_string_list(value: Option<String>, defaults: &[&str]) -> Vec<String> {
    match value {
        Some(raw) => raw
            .split(',')
            .map(|item| item.trim().to_ascii_lowercase())
            .filter(|item| !item.is_empty())
            .collect(),
        None => defaults.iter().map(|item| item.to_string()).collect(),
    }
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

pub(super) fn parse_grading_contract(value: Option<String>) -> Result<GradingContract, ConfigError> {
    let Some(raw) = value else {
        return Ok(GradingContract::WeightedScore);
    };

    match raw.to_ascii_lowercase().replace('-', "_").as_str() {
        "weighted_score" | "weighted" => Ok(GradingContract::WeightedScore),
        "structured_report" | "report" => Ok(GradingContract::StructuredReport),
        _ => Err(ConfigError::InvalidValue { field: "GRADING_CONTRACT", value: raw }),
    }
}

pub(super) fn is_supported_image_extension(extension: &str) -> bool {
    matches!(extension, "jpg" | "jpeg" | "png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_json() {
        let raw = "[\"http://a\",\"http://b\"]".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_csv() {
        let raw = "http://a, http://b".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors csv");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_wildcard_means_any() {
        assert!(parse_cors_origins(Some("*".to_string())).expect("cors wildcard").is_empty());
        assert!(parse_cors_origins(None).expect("cors default").is_empty());
    }

    #[test]
    fn parse_cors_origins_rejects_broken_json() {
        assert!(parse_cors_origins(Some("[\"http://a\"".to_string())).is_err());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(None), Environment::Development);
    }

    #[test]
    fn parse_grading_contract_variants() {
        assert_eq!(parse_grading_contract(None).unwrap(), GradingContract::WeightedScore);
        assert_eq!(
            parse_grading_contract(Some("structured-report".to_string())).unwrap(),
            GradingContract::StructuredReport
        );
        assert_eq!(
            parse_grading_contract(Some("Weighted".to_string())).unwrap(),
            GradingContract::WeightedScore
        );
        assert!(matches!(
            parse_grading_contract(Some("freeform".to_string())),
            Err(ConfigError::InvalidValue { field: "GRADING_CONTRACT", .. })
        ));
    }

    #[test]
    fn parse_temperature_bounds() {
        assert_eq!(parse_temperature("LLM_TEMPERATURE", "0.2".to_string()).unwrap(), 0.2);
        assert!(parse_temperature("LLM_TEMPERATURE", "3".to_string()).is_err());
        assert!(parse_temperature("LLM_TEMPERATURE", "warm".to_string()).is_err());
    }
}
