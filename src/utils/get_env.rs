use anyhow::{Error, anyhow};
use dotenv::dotenv;
use std::env;
use std::str::FromStr;

pub fn get_env_var(key: &str) -> Result<String, Error> {
    dotenv().ok();
    env::var(key).map_err(|_| anyhow!("missing required environment variable {key}"))
}

/// Reads an optional variable. Unset or blank values are `None`.
pub fn get_optional_env_var(key: &str) -> Option<String> {
    dotenv().ok();
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
        _ => None,
    }
}

/// Parses an optional variable, falling back to `default` when unset. A value
/// that is set but does not parse is an error rather than a silent default.
pub fn env_var_or<T>(key: &str, default: T) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env_var(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value {raw:?} for {key}: {e}")),
    }
}
