use crate::backend::HttpBackendConfig;
use crate::chat::ChatOptions;
use crate::error::{DeskError, Result};
use crate::settings::{Settings, SETTING_KEYS};
use crate::upload::SimulatedProgress;
use std::env;
use std::time::Duration;

const ENV_PREFIX: &str = "SUPPORT_DESK_";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPLOAD_TICK_MS: u64 = 200;
const DEFAULT_UPLOAD_MAX_STEP: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub upload_tick: Duration,
    pub upload_max_step: f64,
    pub greeting: bool,
    pub settings: Settings,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            upload_tick: Duration::from_millis(DEFAULT_UPLOAD_TICK_MS),
            upload_max_step: DEFAULT_UPLOAD_MAX_STEP,
            greeting: true,
            settings: Settings::default(),
        }
    }
}

impl DeskConfig {
    /// Load from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let mut config = DeskConfig::default();

        if let Some(url) = var("API_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DeskError::Config(format!(
                    "{}API_URL must be an http(s) URL, got {}",
                    ENV_PREFIX, url
                )));
            }
            config.api_url = url;
        }

        if let Some(secs) = var("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_value("REQUEST_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(DeskError::Config(format!(
                    "{}REQUEST_TIMEOUT_SECS must be greater than 0",
                    ENV_PREFIX
                )));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(ms) = var("UPLOAD_TICK_MS") {
            let ms: u64 = parse_value("UPLOAD_TICK_MS", &ms)?;
            if ms == 0 {
                return Err(DeskError::Config(format!(
                    "{}UPLOAD_TICK_MS must be greater than 0",
                    ENV_PREFIX
                )));
            }
            config.upload_tick = Duration::from_millis(ms);
        }

        if let Some(step) = var("UPLOAD_MAX_STEP") {
            let step: f64 = parse_value("UPLOAD_MAX_STEP", &step)?;
            if !(step > 0.0 && step <= 100.0) {
                return Err(DeskError::Config(format!(
                    "{}UPLOAD_MAX_STEP must be in (0, 100], got {}",
                    ENV_PREFIX, step
                )));
            }
            config.upload_max_step = step;
        }

        if let Some(flag) = var("GREETING") {
            config.greeting = parse_value("GREETING", &flag)?;
        }

        for key in SETTING_KEYS {
            if let Some(value) = var(&key.to_uppercase()) {
                config
                    .settings
                    .apply(key, &value)
                    .map_err(|e| DeskError::Config(e.to_string()))?;
            }
        }
        config.api_key = config.settings.api_key.clone();

        Ok(config)
    }

    pub fn backend(&self) -> HttpBackendConfig {
        HttpBackendConfig {
            base_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            timeout: self.request_timeout,
        }
    }

    pub fn progress(&self) -> SimulatedProgress {
        SimulatedProgress {
            tick: self.upload_tick,
            max_step: self.upload_max_step,
        }
    }

    pub fn chat(&self) -> ChatOptions {
        ChatOptions {
            reply_timeout: self.request_timeout,
            greeting: self.greeting,
        }
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        DeskError::Config(format!("{}{} has invalid value {:?}", ENV_PREFIX, name, value))
    })
}
