//! Content generation: the language-model collaborator behind personas and
//! forecasts.
//!
//! The rest of the crate only sees [`ContentGenerator`]. Callers must expect
//! latency and failure: every method returns a [`GenerationResult`] and no
//! caller panics on an error.

pub mod http;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::debate::{DebateRound, PersonaRole};

pub use http::{GenerationConfig, HttpGenerator};
pub use prompt::{extract_json, PromptBuilder};

/// Errors from content generation
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Generator unavailable: {0}")]
    Unavailable(String),
}

/// Result type for generation calls
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Demand forecast returned for one SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityPrediction {
    #[serde(alias = "expectedQty")]
    pub expected_qty: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Shared generator handle
pub type SharedContentGenerator = Arc<dyn ContentGenerator>;

/// Opaque asynchronous content generator
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produce a debate position for `role` from a role-specific prompt.
    async fn generate_position(
        &self,
        role: PersonaRole,
        prompt: &str,
    ) -> GenerationResult<DebateRound>;

    /// Forecast a quantity from a prompt describing the item's history.
    async fn predict_quantity(&self, prompt: &str) -> GenerationResult<QuantityPrediction>;
}
