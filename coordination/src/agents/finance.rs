//! Finance scout: z-score anomaly detection over a metric series.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::agent::{Agent, AgentContext, AgentError, AgentResult, InsightOptions, Task};
use crate::bus::Message;
use crate::learning::{CoachingFeedback, CoachingMetric};
use crate::state::{Anomaly, AnomalyStatus, Domain, FinancePatch, InsightLevel};

/// Default agent id
pub const FINANCE_SCOUT_ID: &str = "finance-scout";

/// Task type handled by the scout
pub const DETECT_ANOMALIES: &str = "detect_anomalies";

const MIN_SERIES_LEN: usize = 3;
const SENSITIVITY_STEP: f64 = 0.5;
const MAX_SENSITIVITY: f64 = 4.0;
const FLOOR_STEP: f64 = 0.05;
const MAX_CONFIDENCE_FLOOR: f64 = 0.95;

#[derive(Debug, Deserialize)]
struct DetectRequest {
    metric: String,
    values: Vec<f64>,
    #[serde(default)]
    cash_position: Option<f64>,
}

/// Flags points whose z-score reaches `anomaly_sensitivity`.
///
/// Confidence is |z| / (|z| + 1); points under `confidence_floor` are not
/// reported. Points at 1.5× the sensitivity are critical, the rest warnings.
#[derive(Debug, Clone)]
pub struct FinanceScout {
    id: String,
    anomaly_sensitivity: f64,
    confidence_floor: f64,
}

impl FinanceScout {
    pub fn new() -> Self {
        Self::with_id(FINANCE_SCOUT_ID)
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            anomaly_sensitivity: 2.0,
            confidence_floor: 0.6,
        }
    }

    pub fn anomaly_sensitivity(&self) -> f64 {
        self.anomaly_sensitivity
    }

    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor
    }

    /// Anomalies in `values` for `metric`. Empty when the series is flat.
    pub fn detect(&self, metric: &str, values: &[f64]) -> Vec<Anomaly> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        if std_dev == 0.0 || !std_dev.is_finite() {
            return Vec::new();
        }

        values
            .iter()
            .enumerate()
            .filter_map(|(i, &value)| {
                let z = (value - mean) / std_dev;
                let magnitude = z.abs();
                if magnitude < self.anomaly_sensitivity {
                    return None;
                }
                let confidence = magnitude / (magnitude + 1.0);
                if confidence < self.confidence_floor {
                    return None;
                }
                let severity = if magnitude >= self.anomaly_sensitivity * 1.5 {
                    InsightLevel::Critical
                } else {
                    InsightLevel::Warning
                };
                Some(Anomaly {
                    id: format!("anomaly-{}-{}", metric, i),
                    metric: metric.to_string(),
                    value,
                    expected: mean,
                    deviation: z,
                    severity,
                    status: AnomalyStatus::Open,
                    note: None,
                    detected_at: Utc::now(),
                })
            })
            .collect()
    }
}

impl Default for FinanceScout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for FinanceScout {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![DETECT_ANOMALIES.to_string(), "finance".to_string()]
    }

    async fn process(&mut self, task: &Task, ctx: &AgentContext) -> AgentResult<serde_json::Value> {
        if task.task_type != DETECT_ANOMALIES {
            return Err(AgentError::InvalidTask(format!(
                "{} cannot handle {}",
                self.id, task.task_type
            )));
        }
        let request: DetectRequest = serde_json::from_value(task.payload.clone())
            .map_err(|e| AgentError::InvalidTask(e.to_string()))?;
        if request.values.len() < MIN_SERIES_LEN {
            return Err(AgentError::InvalidTask(format!(
                "series for {} has {} points, need at least {}",
                request.metric,
                request.values.len(),
                MIN_SERIES_LEN
            )));
        }

        let found = self.detect(&request.metric, &request.values);

        let fresh: Vec<Anomaly> = found
            .iter()
            .filter(|a| !ctx.store.update_anomaly(&a.id, (*a).clone()))
            .cloned()
            .collect();
        let anomalies = (!fresh.is_empty()).then(|| {
            let mut all = ctx.store.get_finance_state().anomalies;
            all.extend(fresh);
            all
        });
        ctx.store.update_finance_state(FinancePatch {
            anomalies,
            cash_position: request.cash_position,
        });

        let mut insight_ids = Vec::with_capacity(found.len());
        for anomaly in &found {
            let direction = if anomaly.deviation > 0.0 { "above" } else { "below" };
            let insight = ctx.publish_insight(
                Domain::Finance,
                &format!("{} anomaly", anomaly.metric),
                &format!(
                    "{} = {:.2} is {:.1}σ {} the mean of {:.2}",
                    anomaly.metric,
                    anomaly.value,
                    anomaly.deviation.abs(),
                    direction,
                    anomaly.expected
                ),
                InsightOptions::default()
                    .level(anomaly.severity)
                    .confidence(anomaly.deviation.abs() / (anomaly.deviation.abs() + 1.0))
                    .data(serde_json::to_value(anomaly).unwrap_or_default())
                    .suggested_actions(vec![format!("Review {} postings", anomaly.metric)]),
            )?;
            insight_ids.push(insight.id);
        }

        debug!(
            agent_id = %self.id,
            metric = %request.metric,
            points = request.values.len(),
            anomalies = found.len(),
            "Anomaly scan finished"
        );

        Ok(json!({
            "metric": request.metric,
            "anomalies": found.len(),
            "insight_ids": insight_ids,
        }))
    }

    fn apply_coaching(&mut self, feedback: &CoachingFeedback) -> Vec<String> {
        match feedback.metric {
            CoachingMetric::UserAcceptance => {
                let before = self.anomaly_sensitivity;
                self.anomaly_sensitivity = (before + SENSITIVITY_STEP).min(MAX_SENSITIVITY);
                if self.anomaly_sensitivity == before {
                    return Vec::new();
                }
                vec![format!(
                    "anomaly_sensitivity {:.2} -> {:.2}",
                    before, self.anomaly_sensitivity
                )]
            }
            CoachingMetric::Accuracy => {
                let before = self.confidence_floor;
                self.confidence_floor = (before + FLOOR_STEP).min(MAX_CONFIDENCE_FLOOR);
                if self.confidence_floor == before {
                    return Vec::new();
                }
                vec![format!(
                    "confidence_floor {:.2} -> {:.2}",
                    before, self.confidence_floor
                )]
            }
        }
    }

    async fn on_data_request(
        &mut self,
        _message: &Message,
        ctx: &AgentContext,
    ) -> Option<serde_json::Value> {
        serde_json::to_value(ctx.store.get_finance_state()).ok()
    }
}
