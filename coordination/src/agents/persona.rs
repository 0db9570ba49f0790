//! Debate persona agents (optimist, pessimist, mediator).
//!
//! A persona answers `debate_round` tasks whose payload is the debate record
//! so far, producing its round through the content generator.

use async_trait::async_trait;
use tracing::debug;

use crate::agent::{Agent, AgentContext, AgentError, AgentResult, Task};
use crate::debate::{DebateRecord, PersonaRole};
use crate::generation::{PromptBuilder, SharedContentGenerator};
use crate::learning::{CoachingFeedback, CoachingMetric};

pub const DEBATE_ROUND: &str = "debate_round";

const BIAS_STEP: f64 = 0.05;
const MIN_CONFIDENCE_BIAS: f64 = -0.3;

pub struct PersonaAgent {
    id: String,
    role: PersonaRole,
    generator: SharedContentGenerator,
    prompts: PromptBuilder,
    confidence_bias: f64,
}

impl PersonaAgent {
    /// Persona for `team`, with id `<team>-<role>`.
    pub fn new(
        team: &str,
        role: PersonaRole,
        generator: SharedContentGenerator,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            id: format!("{}-{}", team, role),
            role,
            generator,
            prompts,
            confidence_bias: 0.0,
        }
    }

    /// The full trio for a team.
    pub fn trio(
        team: &str,
        generator: SharedContentGenerator,
        prompts: PromptBuilder,
    ) -> Vec<PersonaAgent> {
        PersonaRole::all()
            .iter()
            .map(|role| Self::new(team, *role, generator.clone(), prompts.clone()))
            .collect()
    }

    pub fn role(&self) -> PersonaRole {
        self.role
    }

    pub fn confidence_bias(&self) -> f64 {
        self.confidence_bias
    }
}

#[async_trait]
impl Agent for PersonaAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![DEBATE_ROUND.to_string(), self.role.to_string()]
    }

    async fn process(&mut self, task: &Task, _ctx: &AgentContext) -> AgentResult<serde_json::Value> {
        if task.task_type != DEBATE_ROUND {
            return Err(AgentError::InvalidTask(format!(
                "{} cannot handle {}",
                self.id, task.task_type
            )));
        }
        let record: DebateRecord = serde_json::from_value(task.payload.clone())
            .map_err(|e| AgentError::InvalidTask(e.to_string()))?;
        if record.current_phase.speaker() != Some(self.role) {
            return Err(AgentError::InvalidTask(format!(
                "{} does not speak in phase {}",
                self.role, record.current_phase
            )));
        }

        let prompt = self.prompts.debate_prompt(self.role, &record);
        let mut round = self.generator.generate_position(self.role, &prompt).await?;
        round.role = self.role;
        round.confidence = (round.confidence + self.confidence_bias).clamp(0.0, 1.0);

        debug!(
            agent_id = %self.id,
            debate_id = %record.id,
            confidence = round.confidence,
            "Persona round generated"
        );
        serde_json::to_value(&round).map_err(|e| AgentError::Processing(e.to_string()))
    }

    fn apply_coaching(&mut self, feedback: &CoachingFeedback) -> Vec<String> {
        // Both metrics mean the persona claims more certainty than it earns
        let step = match feedback.metric {
            CoachingMetric::UserAcceptance => BIAS_STEP,
            CoachingMetric::Accuracy => BIAS_STEP * 2.0,
        };
        let before = self.confidence_bias;
        self.confidence_bias = (before - step).max(MIN_CONFIDENCE_BIAS);
        if self.confidence_bias == before {
            return Vec::new();
        }
        vec![format!(
            "confidence_bias {:.2} -> {:.2}",
            before, self.confidence_bias
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use crate::debate::{domain_for_team, DebatePhase, DebateRequest, DebateRound};
    use crate::generation::{ContentGenerator, GenerationResult, QuantityPrediction};
    use crate::learning::LearningRegistry;
    use crate::state::StateStore;
    use chrono::Utc;
    use std::sync::Arc;

    struct Confident;

    #[async_trait]
    impl ContentGenerator for Confident {
        async fn generate_position(
            &self,
            role: PersonaRole,
            prompt: &str,
        ) -> GenerationResult<DebateRound> {
            Ok(DebateRound {
                role,
                position: format!("{} view", role),
                reasoning: prompt.lines().next().unwrap_or_default().to_string(),
                evidence: vec!["q3 ledger".to_string()],
                confidence: 0.9,
                suggested_actions: vec![],
            })
        }

        async fn predict_quantity(&self, _prompt: &str) -> GenerationResult<QuantityPrediction> {
            Ok(QuantityPrediction {
                expected_qty: 0.0,
                reasoning: String::new(),
            })
        }
    }

    fn record(phase: DebatePhase) -> DebateRecord {
        let request = DebateRequest::new("finance", "Extend payment terms?");
        let mut record = DebateRecord::new(DebateRecord::new_id(), request, domain_for_team("finance"), 1);
        record.current_phase = phase;
        record
    }

    fn ctx() -> AgentContext {
        AgentContext::new(
            "finance-optimist",
            MessageBus::new().shared(),
            StateStore::new().shared(),
            LearningRegistry::new().shared(),
        )
    }

    #[test]
    fn test_trio_ids() {
        let trio = PersonaAgent::trio("finance", Arc::new(Confident), PromptBuilder::default());
        let ids: Vec<&str> = trio.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["finance-optimist", "finance-pessimist", "finance-mediator"]);
    }

    #[tokio::test]
    async fn test_round_for_own_phase_only() {
        let mut optimist = PersonaAgent::new(
            "finance",
            PersonaRole::Optimist,
            Arc::new(Confident),
            PromptBuilder::default(),
        );

        let task = Task::new(DEBATE_ROUND, serde_json::to_value(record(DebatePhase::Thesis)).unwrap());
        let output = optimist.process(&task, &ctx()).await.unwrap();
        let round: DebateRound = serde_json::from_value(output).unwrap();
        assert_eq!(round.role, PersonaRole::Optimist);
        assert_eq!(round.confidence, 0.9);

        let task = Task::new(
            DEBATE_ROUND,
            serde_json::to_value(record(DebatePhase::Antithesis)).unwrap(),
        );
        assert!(matches!(
            optimist.process(&task, &ctx()).await,
            Err(AgentError::InvalidTask(_))
        ));
    }

    #[tokio::test]
    async fn test_coaching_lowers_confidence() {
        let mut optimist = PersonaAgent::new(
            "finance",
            PersonaRole::Optimist,
            Arc::new(Confident),
            PromptBuilder::default(),
        );
        let feedback = CoachingFeedback {
            agent_id: "finance-optimist".to_string(),
            metric: CoachingMetric::Accuracy,
            current_score: 40,
            benchmark: 80,
            suggestion: String::new(),
            examples: vec![],
            generated_at: Utc::now(),
        };
        assert_eq!(optimist.apply_coaching(&feedback), vec!["confidence_bias 0.00 -> -0.10"]);

        let task = Task::new(DEBATE_ROUND, serde_json::to_value(record(DebatePhase::Thesis)).unwrap());
        let round: DebateRound =
            serde_json::from_value(optimist.process(&task, &ctx()).await.unwrap()).unwrap();
        assert!((round.confidence - 0.8).abs() < 1e-9);

        for _ in 0..5 {
            optimist.apply_coaching(&feedback);
        }
        assert_eq!(optimist.confidence_bias(), MIN_CONFIDENCE_BIAS);
        assert!(optimist.apply_coaching(&feedback).is_empty());
    }
}
