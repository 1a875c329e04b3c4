//! # External Collaborators
//!
//! Narrow interfaces to the hosted chat, vision and speech services, plus
//! the retry/circuit-breaker protection applied at this boundary. The state
//! machine only sees the traits; a failing collaborator surfaces as
//! [`BotError::CollaboratorUnavailable`] and never ends a session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RecoveryConfig;
use crate::errors::BotError;
use crate::session::ScanType;

/// A label/confidence pair from image classification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Concept {
    pub name: String,
    pub confidence: f32,
}

/// Open-ended chat completion with per-user history.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, user_id: i64, prompt: &str) -> Result<String, BotError>;
    /// Forget the user's conversation history (called when exiting chat mode).
    async fn clear_history(&self, user_id: i64);
}

/// Image classification for compost/plant scans.
#[async_trait]
pub trait VisionAnalysis: Send + Sync {
    async fn classify_image(
        &self,
        image: &[u8],
        category: ScanType,
    ) -> Result<Vec<Concept>, BotError>;
}

/// Voice-note transcription.
#[async_trait]
pub trait SpeechTranscription: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, BotError>;
}

/// Circuit breaker for collaborator calls. When a service fails repeatedly
/// the breaker opens and requests fail fast until the reset timeout elapses.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: Mutex<u32>,
    last_failure_time: Mutex<Option<Instant>>,
    threshold: u32,
    reset_secs: u64,
}

impl CircuitBreaker {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            failure_count: Mutex::new(0),
            last_failure_time: Mutex::new(None),
            threshold: config.circuit_breaker_threshold,
            reset_secs: config.circuit_breaker_reset_secs,
        }
    }

    /// `true` while the breaker blocks requests. Automatically closes again
    /// once the reset timeout has elapsed.
    pub fn is_open(&self) -> bool {
        let failure_count = *self.failure_count.lock().unwrap();
        let last_failure = *self.last_failure_time.lock().unwrap();

        if failure_count >= self.threshold {
            if let Some(last_time) = last_failure {
                if last_time.elapsed() < Duration::from_secs(self.reset_secs) {
                    return true;
                }
                *self.failure_count.lock().unwrap() = 0;
                *self.last_failure_time.lock().unwrap() = None;
            }
        }
        false
    }

    pub fn record_failure(&self) {
        *self.failure_count.lock().unwrap() += 1;
        *self.last_failure_time.lock().unwrap() = Some(Instant::now());
    }

    pub fn record_success(&self) {
        *self.failure_count.lock().unwrap() = 0;
        *self.last_failure_time.lock().unwrap() = None;
    }
}

/// Backoff delay for a retry attempt, with random jitter so concurrent
/// sessions do not retry in lockstep.
fn retry_delay(config: &RecoveryConfig, attempt: u32) -> Duration {
    let base = config.base_retry_delay_ms.saturating_mul(1u64 << attempt.min(6));
    let capped = base.min(config.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
    Duration::from_millis(capped + jitter)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: String,
}

/// Reqwest client for the hosted chat-completion service.
pub struct ChatServiceClient {
    client: reqwest::Client,
    host: String,
    model: String,
    history: Mutex<HashMap<i64, Vec<ChatMessage>>>,
    breaker: CircuitBreaker,
    recovery: RecoveryConfig,
}

impl ChatServiceClient {
    pub fn new(host: String, model: String, recovery: RecoveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.operation_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            host,
            model,
            history: Mutex::new(HashMap::new()),
            breaker: CircuitBreaker::new(&recovery),
            recovery,
        }
    }

    async fn post_chat(&self, messages: &[ChatMessage]) -> Result<String, BotError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
        };
        let response = self
            .client
            .post(format!("{}/chat", self.host))
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::CollaboratorUnavailable(e.to_string()))?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BotError::CollaboratorUnavailable(e.to_string()))?;
        Ok(parsed.content)
    }
}

#[async_trait]
impl ChatCompletion for ChatServiceClient {
    async fn complete(&self, user_id: i64, prompt: &str) -> Result<String, BotError> {
        if self.breaker.is_open() {
            return Err(BotError::CollaboratorUnavailable(
                "chat service circuit open".to_string(),
            ));
        }

        let messages = {
            let mut history = self.history.lock().unwrap();
            let entry = history.entry(user_id).or_default();
            entry.push(ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            });
            entry.clone()
        };

        let mut last_error = None;
        for attempt in 0..=self.recovery.max_retries {
            match self.post_chat(&messages).await {
                Ok(content) => {
                    self.breaker.record_success();
                    let mut history = self.history.lock().unwrap();
                    history.entry(user_id).or_default().push(ChatMessage {
                        role: "assistant".to_string(),
                        content: content.clone(),
                    });
                    return Ok(content);
                }
                Err(e) => {
                    warn!(user_id, attempt, error = %e, "Chat completion attempt failed");
                    last_error = Some(e);
                    if attempt < self.recovery.max_retries {
                        tokio::time::sleep(retry_delay(&self.recovery, attempt)).await;
                    }
                }
            }
        }

        self.breaker.record_failure();
        Err(last_error.unwrap_or_else(|| {
            BotError::CollaboratorUnavailable("chat service unreachable".to_string())
        }))
    }

    async fn clear_history(&self, user_id: i64) {
        self.history.lock().unwrap().remove(&user_id);
        debug!(user_id, "Chat history cleared");
    }
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    concepts: Vec<Concept>,
}

/// Reqwest client for the image-classification service.
pub struct VisionServiceClient {
    client: reqwest::Client,
    host: String,
    breaker: CircuitBreaker,
}

impl VisionServiceClient {
    pub fn new(host: String, recovery: &RecoveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.operation_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            host,
            breaker: CircuitBreaker::new(recovery),
        }
    }
}

#[async_trait]
impl VisionAnalysis for VisionServiceClient {
    async fn classify_image(
        &self,
        image: &[u8],
        category: ScanType,
    ) -> Result<Vec<Concept>, BotError> {
        if self.breaker.is_open() {
            return Err(BotError::CollaboratorUnavailable(
                "vision service circuit open".to_string(),
            ));
        }

        let model = match category {
            ScanType::CompostTank => "compost",
            ScanType::Plant => "plant",
        };
        let result = self
            .client
            .post(format!("{}/classify/{model}", self.host))
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| BotError::CollaboratorUnavailable(e.to_string()));

        match result {
            Ok(response) => {
                let parsed: ClassifyResponse = response
                    .json()
                    .await
                    .map_err(|e| BotError::CollaboratorUnavailable(e.to_string()))?;
                self.breaker.record_success();
                Ok(parsed.concepts)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// Reqwest client for the speech-transcription service.
pub struct SpeechServiceClient {
    client: reqwest::Client,
    host: String,
}

impl SpeechServiceClient {
    pub fn new(host: String, recovery: &RecoveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.operation_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, host }
    }
}

#[async_trait]
impl SpeechTranscription for SpeechServiceClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, BotError> {
        let response = self
            .client
            .post(format!("{}/transcribe", self.host))
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| BotError::CollaboratorUnavailable(e.to_string()))?;
        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| BotError::CollaboratorUnavailable(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RecoveryConfig {
        RecoveryConfig {
            circuit_breaker_threshold: 2,
            circuit_breaker_reset_secs: 60,
            ..RecoveryConfig::default()
        }
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::new(&config());
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_breaker_success_resets() {
        let breaker = CircuitBreaker::new(&config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_retry_delay_is_bounded() {
        let recovery = RecoveryConfig::default();
        for attempt in 0..10 {
            let delay = retry_delay(&recovery, attempt);
            assert!(delay.as_millis() as u64 <= recovery.max_retry_delay_ms * 2);
        }
    }
}
