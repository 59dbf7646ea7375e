#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_API_BASE: &str = "https://api.bilibili.com";
pub const MIN_PAGE_DELAY: Duration = Duration::from_millis(500);
pub const MIN_TRANSFER_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_PAGE_DELAY: Duration = MIN_PAGE_DELAY;
pub const DEFAULT_TRANSFER_DELAY: Duration = MIN_TRANSFER_DELAY;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

const COOKIES_KEY: &str = "BILI_COOKIES";
const API_BASE_KEY: &str = "FAVLIST_API_BASE";
const PAGE_DELAY_KEY: &str = "FAVLIST_PAGE_DELAY_MS";
const TRANSFER_DELAY_KEY: &str = "FAVLIST_TRANSFER_DELAY_MS";
const HTTP_TIMEOUT_KEY: &str = "FAVLIST_HTTP_TIMEOUT_SECS";
const DEDUPE_KEY: &str = "FAVLIST_DEDUPE";

/// Everything a single run needs besides the two URLs.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub cookies: Option<String>,
    pub api_base: String,
    pub page_delay: Duration,
    pub transfer_delay: Duration,
    pub http_timeout: Duration,
    pub dedupe: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            cookies: None,
            api_base: DEFAULT_API_BASE.to_string(),
            page_delay: DEFAULT_PAGE_DELAY,
            transfer_delay: DEFAULT_TRANSFER_DELAY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            dedupe: false,
        }
    }
}

impl TransferConfig {
    /// Endpoint URL relative to the configured API base.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cookies: Option<String>,
    pub api_base: Option<String>,
    pub page_delay: Option<Duration>,
    pub transfer_delay: Option<Duration>,
    pub http_timeout: Option<Duration>,
    pub dedupe: Option<bool>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_transfer_config(overrides: ConfigOverrides) -> Result<TransferConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    Ok(build_transfer_config_with_overrides(
        &file_vars,
        env_var_string,
        overrides,
    ))
}

#[cfg(test)]
fn build_transfer_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> TransferConfig {
    build_transfer_config_with_overrides(file_vars, env_lookup, ConfigOverrides::default())
}

fn build_transfer_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> TransferConfig {
    let lookup_millis = |key: &str| {
        lookup_value(key, file_vars, &env_lookup)
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
    };
    let cookies = overrides
        .cookies
        .filter(|value| !value.trim().is_empty())
        .or_else(|| lookup_value(COOKIES_KEY, file_vars, &env_lookup));
    let api_base = overrides
        .api_base
        .filter(|value| !value.trim().is_empty())
        .or_else(|| lookup_value(API_BASE_KEY, file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    // Configured pauses never go below the rate-limit floors.
    let page_delay = overrides
        .page_delay
        .or_else(|| lookup_millis(PAGE_DELAY_KEY))
        .unwrap_or(DEFAULT_PAGE_DELAY)
        .max(MIN_PAGE_DELAY);
    let transfer_delay = overrides
        .transfer_delay
        .or_else(|| lookup_millis(TRANSFER_DELAY_KEY))
        .unwrap_or(DEFAULT_TRANSFER_DELAY)
        .max(MIN_TRANSFER_DELAY);
    let http_timeout = overrides
        .http_timeout
        .or_else(|| {
            lookup_value(HTTP_TIMEOUT_KEY, file_vars, &env_lookup)
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        })
        .unwrap_or(DEFAULT_HTTP_TIMEOUT);
    let dedupe = overrides
        .dedupe
        .or_else(|| {
            lookup_value(DEDUPE_KEY, file_vars, &env_lookup).and_then(|value| parse_flag(&value))
        })
        .unwrap_or(false);

    TransferConfig {
        cookies,
        api_base,
        page_delay,
        transfer_delay,
        http_timeout,
        dedupe,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
