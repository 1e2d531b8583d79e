use std::fmt;
use thiserror::Error;

/// A single offending request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid JSON: {0}")]
    Malformed(String),
    #[error("Payload must be a JSON object")]
    NotAnObject,
    #[error("Invalid fields: {}", join_fields(.0))]
    Fields(Vec<FieldError>),
}

impl ValidationError {
    /// Names of the fields that failed, empty for payload-level failures.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValidationError::Fields(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Expected obs shape ({expected},), got ({actual},)")]
pub struct ShapeError {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {0}")]
    NotFound(String),
    #[error("Device error: {0}")]
    Device(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Policy action space must have {expected} actions, artifact exposes {actual}")]
    ActionSpace { expected: usize, actual: usize },
    #[error("Policy probe failed: {0}")]
    Probe(#[from] InferenceError),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Output error: {0}")]
    Output(String),
    #[error("Action index {index} outside action space of {size}")]
    ActionIndex { index: usize, size: usize },
    #[error("Invalid probability distribution: {0}")]
    Distribution(String),
}

impl From<ort::Error> for InferenceError {
    fn from(err: ort::Error) -> Self {
        InferenceError::Runtime(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DecideError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
