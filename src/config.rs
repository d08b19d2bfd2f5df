//! Process configuration
//!
//! Everything is read from the environment once at startup and then passed
//! explicitly; nothing below `main` looks at environment variables.

use crate::conversation::DEFAULT_PACING;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Clone)]
pub struct DuetConfig {
    /// Absent means the server runs but every conversation start fails
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub pacing: Duration,
}

impl DuetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let google_api_key = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty());

        let port = match lookup("DUET_PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "DUET_PORT",
                expected: "a port number",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let request_timeout = match lookup("DUET_REQUEST_TIMEOUT_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DUET_REQUEST_TIMEOUT_SECS",
                        expected: "a positive number of seconds",
                        value,
                    })
                }
            },
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let pacing = match lookup("DUET_PACING_MS") {
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid {
                    var: "DUET_PACING_MS",
                    expected: "a number of milliseconds",
                    value,
                })?,
            None => DEFAULT_PACING,
        };

        Ok(Self {
            google_api_key,
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: lookup("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            port,
            request_timeout,
            pacing,
        })
    }

    /// The key with all but its first and last three characters hidden.
    pub fn masked_api_key(&self) -> Option<String> {
        self.google_api_key.as_deref().map(mask)
    }
}

impl fmt::Debug for DuetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuetConfig")
            .field("google_api_key", &self.masked_api_key())
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("pacing", &self.pacing)
            .finish()
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}...{tail}")
}
