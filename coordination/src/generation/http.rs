//! OpenAI-compatible chat-completions generator.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{parse_json, PromptBuilder};
use super::{ContentGenerator, GenerationError, GenerationResult, QuantityPrediction};
use crate::debate::{DebateRound, PersonaRole};

/// Endpoint settings for [`HttpGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Full chat-completions URL.
    pub endpoint_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8080/v1/chat/completions".to_string(),
            model: "default".to_string(),
            api_key: None,
            timeout_secs: 120,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

#[derive(Deserialize)]
struct RawPosition {
    position: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default, alias = "suggestedActions")]
    suggested_actions: Vec<String>,
}

fn default_confidence() -> f64 {
    0.5
}

/// Generator backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(config: GenerationConfig) -> GenerationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    async fn chat(&self, system: &str, user: &str) -> GenerationResult<String> {
        let start = Instant::now();
        let request_body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let mut request = self.client.post(&self.config.endpoint_url).json(&request_body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::RequestFailed(format!(
                "endpoint error ({}): {}",
                status, body
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| GenerationError::ParseError("missing choices[0].message.content".to_string()))?
            .to_string();

        debug!(
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "Generation complete"
        );
        Ok(content)
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate_position(
        &self,
        role: PersonaRole,
        prompt: &str,
    ) -> GenerationResult<DebateRound> {
        let content = self.chat(PromptBuilder::system_prompt(role), prompt).await?;
        let raw: RawPosition = parse_json(&content)?;
        Ok(DebateRound {
            role,
            position: raw.position,
            reasoning: raw.reasoning,
            evidence: raw.evidence,
            confidence: raw.confidence.clamp(0.0, 1.0),
            suggested_actions: raw.suggested_actions,
        })
    }

    async fn predict_quantity(&self, prompt: &str) -> GenerationResult<QuantityPrediction> {
        let content = self
            .chat(
                "You are a demand planner. Forecast conservatively from the history given.",
                prompt,
            )
            .await?;
        let prediction: QuantityPrediction = parse_json(&content)?;
        if !prediction.expected_qty.is_finite() || prediction.expected_qty < 0.0 {
            return Err(GenerationError::ParseError(format!(
                "invalid expected quantity: {}",
                prediction.expected_qty
            )));
        }
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_position_defaults_and_aliases() {
        let raw: RawPosition =
            serde_json::from_str(r#"{"position": "hold", "suggestedActions": ["wait"]}"#).unwrap();
        assert_eq!(raw.confidence, 0.5);
        assert_eq!(raw.suggested_actions, vec!["wait"]);
        assert!(raw.evidence.is_empty());
    }

    #[test]
    fn test_quantity_alias() {
        let q: QuantityPrediction =
            serde_json::from_str(r#"{"expectedQty": 42.5, "reasoning": "seasonal"}"#).unwrap();
        assert_eq!(q.expected_qty, 42.5);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = GenerationConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let generator = HttpGenerator::new(GenerationConfig {
            endpoint_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();
        let err = generator
            .generate_position(PersonaRole::Optimist, "topic")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::RequestFailed(_)));
    }
}
