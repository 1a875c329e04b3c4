//! # Error Types Module
//!
//! Domain error types for the compost bot. Expected failures (bad input,
//! incomplete profiles, unreachable collaborators) are carried as values so
//! handlers can re-prompt instead of tearing the session down.

/// Validation failures for raw text input.
///
/// Validators never mutate session state; the calling handler uses the tag
/// to re-prompt without advancing.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Input could not be parsed as a number
    NotANumber,
    /// Parsed value fell outside the accepted bounds
    OutOfRange { min: f64, max: f64 },
    /// Semicolon-delimited input had the wrong number of parts
    WrongArity { expected: usize, found: usize },
    /// A part of a delimited input was negative
    NegativeValue,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NotANumber => write!(f, "not a number"),
            ValidationError::OutOfRange { min, max } => {
                write!(f, "value out of range ({min}-{max})")
            }
            ValidationError::WrongArity { expected, found } => {
                write!(f, "expected {expected} values, got {found}")
            }
            ValidationError::NegativeValue => write!(f, "negative values are not allowed"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure classes the state machine distinguishes when recovering.
#[derive(Debug, Clone)]
pub enum BotError {
    /// Malformed or out-of-range user input
    Validation(ValidationError),
    /// A required profile field is unset
    MissingProfileData(&'static str),
    /// Crop name did not match the enumerated set
    InvalidCropType(String),
    /// An external AI/vision/speech call failed or timed out
    CollaboratorUnavailable(String),
    /// An event arrived that the current state does not accept
    InvalidStateTransition(String),
    /// A required trained-model artifact failed to load
    ModelUnavailable(String),
    /// Profile/log store failure
    Store(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::Validation(e) => write!(f, "Validation error: {e}"),
            BotError::MissingProfileData(field) => write!(f, "Missing profile data: {field}"),
            BotError::InvalidCropType(name) => write!(f, "Invalid crop type: {name}"),
            BotError::CollaboratorUnavailable(msg) => {
                write!(f, "Collaborator unavailable: {msg}")
            }
            BotError::InvalidStateTransition(msg) => {
                write!(f, "Invalid state transition: {msg}")
            }
            BotError::ModelUnavailable(msg) => write!(f, "Model unavailable: {msg}"),
            BotError::Store(msg) => write!(f, "Store error: {msg}"),
        }
    }
}

impl std::error::Error for BotError {}

impl From<ValidationError> for BotError {
    fn from(err: ValidationError) -> Self {
        BotError::Validation(err)
    }
}

impl From<anyhow::Error> for BotError {
    fn from(err: anyhow::Error) -> Self {
        BotError::Store(err.to_string())
    }
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        BotError::Store(err.to_string())
    }
}
