//! Role-specific prompt construction and JSON extraction from model output.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use super::{GenerationError, GenerationResult};
use crate::debate::{DebateRecord, PersonaRole};

/// Fenced ```json block.
static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("FENCED_JSON_RE regex should compile")
});

/// Marker appended to truncated context.
const TRUNCATION_MARKER: &str = "…[truncated]";

/// Builds prompts from topic plus context JSON truncated to a character budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    context_char_limit: usize,
}

impl PromptBuilder {
    pub fn new(context_char_limit: usize) -> Self {
        Self { context_char_limit }
    }

    pub fn context_char_limit(&self) -> usize {
        self.context_char_limit
    }

    /// System prompt for a persona.
    pub fn system_prompt(role: PersonaRole) -> &'static str {
        match role {
            PersonaRole::Optimist => {
                "You are the Optimist on a business team's decision panel. Argue the strongest \
                 case FOR the proposal: upside, opportunities, supporting data. Stay factual."
            }
            PersonaRole::Pessimist => {
                "You are the Pessimist on a business team's decision panel. Argue the strongest \
                 case AGAINST the proposal: risks, costs, failure modes, missing data."
            }
            PersonaRole::Mediator => {
                "You are the Mediator on a business team's decision panel. Weigh the thesis and \
                 antithesis and propose a balanced, actionable synthesis."
            }
        }
    }

    /// Context JSON rendered and cut to the character budget.
    pub fn truncated_context(&self, context: &serde_json::Value) -> String {
        if context.is_null() {
            return "{}".to_string();
        }
        let rendered = context.to_string();
        if rendered.chars().count() <= self.context_char_limit {
            return rendered;
        }
        let mut cut: String = rendered.chars().take(self.context_char_limit).collect();
        cut.push_str(TRUNCATION_MARKER);
        cut
    }

    /// Prompt for `role` speaking in `record`'s debate. Earlier rounds are
    /// included so the pessimist sees the thesis and the mediator sees both.
    pub fn debate_prompt(&self, role: PersonaRole, record: &DebateRecord) -> String {
        let mut prompt = format!(
            "## Team\n\n{}\n\n## Topic\n\n{}\n\n## Context\n\n{}\n",
            record.team,
            record.topic,
            self.truncated_context(&record.context)
        );

        for earlier in PersonaRole::all().iter().take_while(|r| **r != role) {
            if let Some(round) = record.round(*earlier) {
                prompt.push_str(&format!(
                    "\n## {} position\n\n{}\n\nReasoning: {}\n",
                    earlier, round.position, round.reasoning
                ));
            }
        }

        prompt.push_str(
            "\nRespond with JSON only: {\"position\": string, \"reasoning\": string, \
             \"evidence\": [string], \"confidence\": number between 0 and 1, \
             \"suggested_actions\": [string]}",
        );
        prompt
    }

    /// Prompt asking for a demand forecast for one SKU.
    pub fn quantity_prompt(&self, sku: &str, on_hand: f64, history: &[f64]) -> String {
        let history = history
            .iter()
            .map(|q| format!("{}", q))
            .collect::<Vec<_>>()
            .join(", ");
        let mut prompt = format!(
            "Forecast next-period demand for SKU {}.\nOn hand: {}\nRecent demand (oldest first): [{}]\n",
            sku, on_hand, history
        );
        if prompt.chars().count() > self.context_char_limit {
            prompt = prompt.chars().take(self.context_char_limit).collect();
            prompt.push_str(TRUNCATION_MARKER);
        }
        prompt.push_str("\nRespond with JSON only: {\"expectedQty\": number, \"reasoning\": string}");
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(2_000)
    }
}

/// Locate the JSON object in model output: a fenced block if present,
/// otherwise the outermost braces.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON_RE.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract and deserialize the JSON object in model output.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> GenerationResult<T> {
    let json = extract_json(text)
        .ok_or_else(|| GenerationError::ParseError("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| GenerationError::ParseError(e.to_string()))
}
