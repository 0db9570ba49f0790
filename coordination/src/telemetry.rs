//! Tracing setup and span helpers
//!
//! Spans use dot-notation field names so they export cleanly to
//! OpenTelemetry-style collectors.
//!
//! ```text
//! coordination.debate          (one per driven debate)
//!   └─ coordination.phase      (one generation call per persona)
//! coordination.agent_task      (one per task an agent processes)
//! ```

use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::debate::{DebatePhase, PersonaRole};

/// Debate driven end to end.
pub const SPAN_DEBATE: &str = "coordination.debate";

/// One persona's generation call.
pub const SPAN_PHASE: &str = "coordination.phase";

/// One task processed by an agent.
pub const SPAN_AGENT_TASK: &str = "coordination.agent_task";

pub const FIELD_DEBATE_ID: &str = "coordination.debate.id";
pub const FIELD_PHASE: &str = "coordination.debate.phase";
pub const FIELD_ROLE: &str = "coordination.debate.role";
pub const FIELD_AGENT_ID: &str = "coordination.agent.id";
pub const FIELD_TASK_ID: &str = "coordination.task.id";
pub const FIELD_SUCCESS: &str = "coordination.success";
pub const FIELD_DURATION_MS: &str = "coordination.duration_ms";

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "insight_coordination=info";

/// Install the global fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins; otherwise `directive` (or [`DEFAULT_DIRECTIVE`]) is used.
/// Safe to call more than once: later calls are no-ops.
pub fn init_tracing(directive: Option<&str>) {
    let directive = directive.unwrap_or(DEFAULT_DIRECTIVE);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Create a span for driving one debate.
///
/// Fields filled later via [`record_debate_result`]: success, duration.
pub fn debate_span(debate_id: &str) -> Span {
    tracing::info_span!(
        "coordination.debate",
        "coordination.debate.id" = %debate_id,
        "coordination.success" = tracing::field::Empty,
        "coordination.duration_ms" = tracing::field::Empty,
    )
}

/// Record the result on a debate span.
pub fn record_debate_result(span: &Span, success: bool, duration_ms: u64) {
    span.record("coordination.success", success);
    span.record("coordination.duration_ms", duration_ms);
}

/// Create a span for one persona's generation call.
pub fn phase_span(debate_id: &str, phase: DebatePhase, role: PersonaRole) -> Span {
    tracing::info_span!(
        "coordination.phase",
        "coordination.debate.id" = %debate_id,
        "coordination.debate.phase" = %phase,
        "coordination.debate.role" = %role,
    )
}

/// Create a span for one agent task.
///
/// Fields filled later via [`record_agent_task_result`]: success, duration.
pub fn agent_task_span(agent_id: &str, task_id: &str) -> Span {
    tracing::info_span!(
        "coordination.agent_task",
        "coordination.agent.id" = %agent_id,
        "coordination.task.id" = %task_id,
        "coordination.success" = tracing::field::Empty,
        "coordination.duration_ms" = tracing::field::Empty,
    )
}

/// Record the result on an agent task span.
pub fn record_agent_task_result(span: &Span, success: bool, duration_ms: u64) {
    span.record("coordination.success", success);
    span.record("coordination.duration_ms", duration_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    static INIT: Once = Once::new();

    fn init_test_subscriber() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("insight_coordination=debug")
                .with_test_writer()
                .try_init();
        });
    }

    #[test]
    fn test_span_builders_accept_result_fields() {
        init_test_subscriber();

        let span = debate_span("debate-1");
        record_debate_result(&span, true, 1200);
        let _entered = span.enter();

        let phase = phase_span("debate-1", DebatePhase::Thesis, PersonaRole::Optimist);
        drop(phase);

        let task = agent_task_span("finance-scout", "task-1");
        record_agent_task_result(&task, false, 15);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(Some("insight_coordination=warn"));
        init_tracing(None);
    }

    #[test]
    fn test_field_names_use_dot_notation() {
        for field in [
            FIELD_DEBATE_ID,
            FIELD_PHASE,
            FIELD_ROLE,
            FIELD_AGENT_ID,
            FIELD_TASK_ID,
            FIELD_SUCCESS,
            FIELD_DURATION_MS,
        ] {
            assert!(field.starts_with("coordination."), "{}", field);
        }
        assert!(SPAN_DEBATE.starts_with("coordination."));
        assert!(SPAN_PHASE.starts_with("coordination."));
        assert!(SPAN_AGENT_TASK.starts_with("coordination."));
    }
}
