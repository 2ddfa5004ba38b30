//! Configuration module for the stream buffer filter
//!
//! Configuration is loaded from Envoy plugin configuration,
//! NOT from external files. This avoids file I/O in the Wasm sandbox.

use crate::methods::{Method, UnknownMethod};
use serde::Deserialize;

/// Filter configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct FilterConfig {
    /// Request verbs the filter lets through; anything else gets a 405
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,

    /// Initial body buffer size (0 = buffer default)
    #[serde(default)]
    pub initial_buffer_capacity: usize,

    /// Largest partial record kept in memory before the request is rejected
    #[serde(default = "default_max_record_size")]
    pub max_record_size: usize,

    /// Byte terminating each record in a request body
    #[serde(default = "default_record_delimiter")]
    pub record_delimiter: u8,

    /// Whether to log every framed record (for debugging)
    #[serde(default)]
    pub log_records: bool,
}

fn default_allowed_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string()]
}

fn default_max_record_size() -> usize {
    64 * 1024 // 64KB
}

fn default_record_delimiter() -> u8 {
    b'\n'
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_methods: default_allowed_methods(),
            initial_buffer_capacity: 0,
            max_record_size: default_max_record_size(),
            record_delimiter: default_record_delimiter(),
            log_records: false,
        }
    }
}

impl FilterConfig {
    /// Parse configuration from JSON bytes (from Envoy plugin configuration)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str = std::str::from_utf8(bytes)
            .map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: Self = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        // Reject unknown verbs up front rather than on first request
        config.methods()?;
        Ok(config)
    }

    /// Parsed `allowed_methods`, duplicates removed
    pub fn methods(&self) -> Result<Vec<Method>, ConfigError> {
        let mut methods = Vec::with_capacity(self.allowed_methods.len());
        for name in &self.allowed_methods {
            let method: Method = name.parse()?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Ok(methods)
    }
}

/// Configuration parsing errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidUtf8(String),
    InvalidJson(String),
    UnknownMethod(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            ConfigError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            ConfigError::UnknownMethod(m) => write!(f, "Unknown method in allowed_methods: {}", m),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<UnknownMethod> for ConfigError {
    fn from(e: UnknownMethod) -> Self {
        ConfigError::UnknownMethod(e.0)
    }
}
