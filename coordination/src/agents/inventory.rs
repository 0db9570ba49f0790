//! Inventory forecaster: per-SKU demand predictions from the content
//! generator, with reorder alerts when demand outruns stock.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::agent::{Agent, AgentContext, AgentError, AgentResult, InsightOptions, Task};
use crate::generation::{PromptBuilder, SharedContentGenerator};
use crate::learning::{CoachingFeedback, CoachingMetric};
use crate::state::{Domain, InsightLevel, InventoryPatch, InventoryPrediction};

pub const INVENTORY_FORECASTER_ID: &str = "inventory-forecaster";

pub const FORECAST_DEMAND: &str = "forecast_demand";

const MARGIN_STEP: f64 = 0.05;
const MAX_SAFETY_MARGIN: f64 = 0.5;
const FLOOR_STEP: f64 = 0.1;
const MAX_CONFIDENCE_FLOOR: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct StockItem {
    sku: String,
    on_hand: f64,
    #[serde(default)]
    history: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    items: Vec<StockItem>,
}

/// Confidence from demand volatility: 1 / (1 + coefficient of variation).
/// 0.5 with fewer than two observations.
pub fn history_confidence(history: &[f64]) -> f64 {
    if history.len() < 2 {
        return 0.5;
    }
    let n = history.len() as f64;
    let mean = history.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.5;
    }
    let std_dev = (history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    1.0 / (1.0 + std_dev / mean)
}

pub struct InventoryForecaster {
    id: String,
    generator: SharedContentGenerator,
    prompts: PromptBuilder,
    safety_margin: f64,
    confidence_floor: f64,
}

impl InventoryForecaster {
    pub fn new(generator: SharedContentGenerator, prompts: PromptBuilder) -> Self {
        Self {
            id: INVENTORY_FORECASTER_ID.to_string(),
            generator,
            prompts,
            safety_margin: 0.1,
            confidence_floor: 0.5,
        }
    }

    pub fn safety_margin(&self) -> f64 {
        self.safety_margin
    }

    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor
    }

    /// Whether forecast demand plus the safety margin exceeds stock.
    pub fn needs_reorder(&self, prediction: &InventoryPrediction) -> bool {
        prediction.expected_qty * (1.0 + self.safety_margin) > prediction.on_hand
    }
}

#[async_trait]
impl Agent for InventoryForecaster {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![FORECAST_DEMAND.to_string(), "inventory".to_string()]
    }

    async fn process(&mut self, task: &Task, ctx: &AgentContext) -> AgentResult<serde_json::Value> {
        if task.task_type != FORECAST_DEMAND {
            return Err(AgentError::InvalidTask(format!(
                "{} cannot handle {}",
                self.id, task.task_type
            )));
        }
        let request: ForecastRequest = serde_json::from_value(task.payload.clone())
            .map_err(|e| AgentError::InvalidTask(e.to_string()))?;
        if request.items.is_empty() {
            return Err(AgentError::InvalidTask("no items to forecast".to_string()));
        }

        let mut predictions = Vec::new();
        let mut failures = Vec::new();
        let mut last_error = None;
        for item in &request.items {
            let prompt = self.prompts.quantity_prompt(&item.sku, item.on_hand, &item.history);
            match self.generator.predict_quantity(&prompt).await {
                Ok(forecast) => predictions.push(InventoryPrediction {
                    id: item.sku.clone(),
                    expected_qty: forecast.expected_qty,
                    on_hand: item.on_hand,
                    confidence: history_confidence(&item.history),
                    reasoning: forecast.reasoning,
                    predicted_at: Utc::now(),
                }),
                Err(e) => {
                    warn!(agent_id = %self.id, sku = %item.sku, error = %e, "Forecast failed");
                    failures.push(item.sku.clone());
                    last_error = Some(e);
                }
            }
        }
        if predictions.is_empty() {
            if let Some(e) = last_error {
                return Err(e.into());
            }
        }

        let fresh: Vec<InventoryPrediction> = predictions
            .iter()
            .filter(|p| !ctx.store.update_prediction(&p.id, (*p).clone()))
            .cloned()
            .collect();

        let reorders: Vec<&InventoryPrediction> =
            predictions.iter().filter(|p| self.needs_reorder(p)).collect();

        let current = ctx.store.get_inventory_state();
        let mut alerts = current.reorder_alerts;
        for p in &reorders {
            if !alerts.contains(&p.id) {
                alerts.push(p.id.clone());
            }
        }
        let all_predictions = (!fresh.is_empty()).then(|| {
            let mut all = current.predictions;
            all.extend(fresh);
            all
        });
        ctx.store.update_inventory_state(InventoryPatch {
            predictions: all_predictions,
            reorder_alerts: Some(alerts),
        });

        let mut insight_ids = Vec::new();
        for p in reorders.iter().filter(|p| p.confidence >= self.confidence_floor) {
            let insight = ctx.publish_insight(
                Domain::Inventory,
                &format!("Reorder {}", p.id),
                &format!(
                    "Expected demand {:.0} exceeds {:.0} on hand (shortfall {:.0})",
                    p.expected_qty,
                    p.on_hand,
                    p.shortfall()
                ),
                InsightOptions::default()
                    .level(InsightLevel::Warning)
                    .confidence(p.confidence)
                    .data(json!({"sku": p.id, "expected_qty": p.expected_qty, "on_hand": p.on_hand}))
                    .suggested_actions(vec![format!(
                        "Raise purchase order for {:.0} units of {}",
                        (p.expected_qty * (1.0 + self.safety_margin) - p.on_hand).ceil(),
                        p.id
                    )]),
            )?;
            insight_ids.push(insight.id);
        }

        debug!(
            agent_id = %self.id,
            forecast = predictions.len(),
            failed = failures.len(),
            reorders = reorders.len(),
            "Demand forecast finished"
        );

        Ok(json!({
            "forecast": predictions.len(),
            "failed": failures,
            "reorder": reorders.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
            "insight_ids": insight_ids,
        }))
    }

    fn apply_coaching(&mut self, feedback: &CoachingFeedback) -> Vec<String> {
        match feedback.metric {
            CoachingMetric::UserAcceptance => {
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
            CoachingMetric::Accuracy => {
                let before = self.safety_margin;
                self.safety_margin = (before + MARGIN_STEP).min(MAX_SAFETY_MARGIN);
                if self.safety_margin == before {
                    return Vec::new();
                }
                vec![format!("safety_margin {:.2} -> {:.2}", before, self.safety_margin)]
            }
        }
    }
}
