use crate::error::AppError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GENERATE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub edit_model: String,
    pub generate_model: String,
    pub max_dimension: u32,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = non_blank("GEMINI_API_KEY")
            .or_else(|| non_blank("API_KEY"))
            .ok_or_else(|| AppError::Configuration("API_KEY is not set in environment variables.".into()))?;

        let max_dimension = match non_blank("MAX_IMAGE_DIMENSION") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| AppError::Configuration(format!("MAX_IMAGE_DIMENSION must be a positive integer, got {raw:?}")))?,
            None => DEFAULT_MAX_DIMENSION,
        };

        Ok(Self {
            api_key,
            api_base: non_blank("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            edit_model: non_blank("GEMINI_EDIT_MODEL").unwrap_or_else(|| DEFAULT_EDIT_MODEL.to_string()),
            generate_model: non_blank("GEMINI_GENERATE_MODEL").unwrap_or_else(|| DEFAULT_GENERATE_MODEL.to_string()),
            max_dimension,
            port: non_blank("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = Config::from_lookup(lookup(&[("PORT", "9000")])).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let blank = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(blank, AppError::Configuration(_)));
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "secret")])).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.edit_model, DEFAULT_EDIT_MODEL);
        assert_eq!(config.generate_model, DEFAULT_GENERATE_MODEL);
        assert_eq!(config.max_dimension, 2048);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn rejects_zero_max_dimension() {
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("MAX_IMAGE_DIMENSION", "0")])).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
