//! # Configuration Module
//!
//! Environment-driven configuration plus typed defaults for the tunable
//! groups (collaborator recovery, voice limits, model artifact paths).

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default location of the trained EC forecast artifact
pub const DEFAULT_EC_MODEL_PATH: &str = "models/ec_forecast.json";
/// Default location of the trained moisture lag-regression artifact
pub const DEFAULT_MOISTURE_MODEL_PATH: &str = "models/moisture_lag.json";
/// Longest voice note accepted for transcription, seconds
pub const DEFAULT_MAX_VOICE_SECS: u32 = 30;

/// Recovery configuration for collaborator calls.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single collaborator call in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000,
            max_retry_delay_ms: 10000,
            operation_timeout_secs: 30,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
        }
    }
}

/// Application configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub database_url: String,
    /// Base URL of the hosted chat-completion service
    pub chat_service_host: String,
    pub chat_model: String,
    /// Base URL of the image-classification service
    pub vision_service_host: String,
    /// Base URL of the speech-transcription service
    pub speech_service_host: String,
    pub ec_model_path: PathBuf,
    pub moisture_model_path: PathBuf,
    pub max_voice_secs: u32,
    pub recovery: RecoveryConfig,
}

impl Config {
    /// Read configuration from the environment. Secrets are required; paths
    /// and limits fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            telegram_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            chat_service_host: env::var("CHAT_SERVICE_HOST")
                .context("CHAT_SERVICE_HOST must be set")?,
            chat_model: env::var("CHAT_MODEL")
                .unwrap_or_else(|_| "meta-llama/Meta-Llama-3-8B-Instruct".to_string()),
            vision_service_host: env::var("VISION_SERVICE_HOST")
                .context("VISION_SERVICE_HOST must be set")?,
            speech_service_host: env::var("SPEECH_SERVICE_HOST")
                .context("SPEECH_SERVICE_HOST must be set")?,
            ec_model_path: env::var("EC_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_EC_MODEL_PATH.to_string())
                .into(),
            moisture_model_path: env::var("MOISTURE_MODEL_PATH")
                .unwrap_or_else(|_| DEFAULT_MOISTURE_MODEL_PATH.to_string())
                .into(),
            max_voice_secs: env::var("MAX_VOICE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_VOICE_SECS),
            recovery: RecoveryConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_defaults() {
        let recovery = RecoveryConfig::default();
        assert_eq!(recovery.max_retries, 3);
        assert!(recovery.base_retry_delay_ms < recovery.max_retry_delay_ms);
    }
}
