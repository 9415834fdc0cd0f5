use anyhow::{bail, Context, Result};

use crate::llm_client::DEFAULT_MODEL;

/// Application configuration loaded from environment variables.
/// Fails at startup if the API key is missing or a value does not parse.
/// Loaded once in `main` and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    /// Retries on top of the first attempt, transient errors only.
    pub llm_max_retries: u32,
    /// Temperature for the whole-resume rewrite. Kept low to favor fidelity.
    pub resume_temperature: f32,
    /// Temperature for per-section refinement calls.
    pub section_temperature: f32,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 60)?,
            llm_max_retries: parse_env("LLM_MAX_RETRIES", 2)?,
            resume_temperature: parse_env("RESUME_TEMPERATURE", 0.4)?,
            section_temperature: parse_env("SECTION_TEMPERATURE", 0.7)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("RESUME_TEMPERATURE", self.resume_temperature),
            ("SECTION_TEMPERATURE", self.section_temperature),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{key} must be within [0, 1], got {value}");
            }
        }
        if self.llm_timeout_secs == 0 {
            bail!("LLM_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Config used by unit tests; never touches the process environment.
    pub fn for_tests() -> Self {
        Config {
            anthropic_api_key: "test-key".to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            llm_timeout_secs: 5,
            llm_max_retries: 2,
            resume_temperature: 0.4,
            section_temperature: 0.7,
            max_upload_bytes: 1024 * 1024,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_test_config_is_valid() {
        assert!(Config::for_tests().validate().is_ok());
    }

    #[test]
    fn test_temperature_out_of_range_is_rejected() {
        let mut config = Config::for_tests();
        config.section_temperature = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SECTION_TEMPERATURE"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = Config::for_tests();
        config.llm_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
