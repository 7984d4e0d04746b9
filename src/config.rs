use anyhow::{Context, Error};
use std::time::Duration;

use crate::cli::RunArgs;
use crate::core::gemini::GeminiConfig;
use crate::core::rate_limiter::RateLimitConfig;
use crate::utils::constants::{
    DEFAULT_FLOOD_BURST_PER_MINUTE, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL,
    DEFAULT_GEMINI_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_RATE_LIMIT_QUOTA,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_IMAGE_BYTES,
};
use crate::utils::get_env::{env_var_or, get_env_var};
use crate::utils::urls::to_url;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub gemini: GeminiConfig,
    pub rate_limit: RateLimitConfig,
    pub flood_burst_per_minute: u32,
    pub request_timeout: Duration,
    pub max_image_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let api_key = get_env_var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY must be set (Google AI Studio API key)")?;
        let base = env_var_or("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE.to_string())?;
        let base_url = to_url(&base).with_context(|| format!("invalid GEMINI_API_BASE {base:?}"))?;

        Ok(Self {
            port: env_var_or("PORT", DEFAULT_PORT)?,
            gemini: GeminiConfig {
                api_key,
                model: env_var_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL.to_string())?,
                base_url,
                timeout: Duration::from_secs(env_var_or(
                    "GEMINI_TIMEOUT_SECS",
                    DEFAULT_GEMINI_TIMEOUT_SECS,
                )?),
            },
            rate_limit: RateLimitConfig {
                quota: env_var_or("RATE_LIMIT_QUOTA", DEFAULT_RATE_LIMIT_QUOTA)?,
                window: Duration::from_secs(env_var_or(
                    "RATE_LIMIT_WINDOW_SECS",
                    DEFAULT_RATE_LIMIT_WINDOW_SECS,
                )?),
            },
            flood_burst_per_minute: env_var_or(
                "FLOOD_BURST_PER_MINUTE",
                DEFAULT_FLOOD_BURST_PER_MINUTE,
            )?,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_image_bytes: MAX_IMAGE_BYTES,
        })
    }

    pub fn with_overrides(mut self, args: &RunArgs) -> Self {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(quota) = args.quota {
            self.rate_limit.quota = quota;
        }
        if let Some(secs) = args.window_secs {
            self.rate_limit.window = Duration::from_secs(secs);
        }
        if let Some(model) = &args.model {
            self.gemini.model = model.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // single test so the env mutations below never race each other
    #[test]
    fn test_from_env_and_overrides() {
        unsafe {
            std::env::remove_var("GEMINI_API_KEY");
        }
        assert!(Config::from_env().is_err());

        unsafe {
            std::env::set_var("GEMINI_API_KEY", "secret");
            std::env::set_var("RATE_LIMIT_QUOTA", "5");
            std::env::remove_var("RATE_LIMIT_WINDOW_SECS");
            std::env::remove_var("GEMINI_MODEL");
            std::env::remove_var("GEMINI_API_BASE");
        }
        let config = Config::from_env().unwrap();
        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.rate_limit.quota, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.max_image_bytes, 5 * 1024 * 1024);

        let config = config.with_overrides(&RunArgs {
            port: Some(9999),
            quota: None,
            window_secs: Some(10),
            model: Some("gemini-1.5-pro".to_string()),
        });
        assert_eq!(config.port, 9999);
        assert_eq!(config.rate_limit.quota, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(10));
        assert_eq!(config.gemini.model, "gemini-1.5-pro");

        unsafe {
            std::env::set_var("RATE_LIMIT_QUOTA", "lots");
        }
        assert!(Config::from_env().is_err());

        unsafe {
            std::env::set_var("RATE_LIMIT_QUOTA", "5");
            std::env::set_var("GEMINI_API_BASE", "::not a url::");
        }
        assert!(Config::from_env().is_err());

        unsafe {
            std::env::remove_var("RATE_LIMIT_QUOTA");
            std::env::remove_var("GEMINI_API_BASE");
        }
    }
}
