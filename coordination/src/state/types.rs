//! Type definitions for the shared state store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for insights
pub type InsightId = String;

/// Business domain an agent, slice or debate belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Finance,
    Inventory,
    Production,
    Sales,
    General,
}

impl Domain {
    /// All domains
    pub fn all() -> &'static [Domain] {
        &[
            Self::Finance,
            Self::Inventory,
            Self::Production,
            Self::Sales,
            Self::General,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Inventory => "inventory",
            Self::Production => "production",
            Self::Sales => "sales",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightLevel {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for InsightLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A structured, agent-produced finding surfaced for human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: InsightId,
    pub agent_id: String,
    pub domain: Domain,
    pub title: String,
    pub description: String,
    pub level: InsightLevel,
    /// Confidence in [0, 1]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub actionable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Insight {
    /// Generate a new insight ID
    pub fn new_id() -> InsightId {
        format!("insight-{}", Uuid::new_v4())
    }
}

/// Items addressable by id within a slice collection
pub trait Identified {
    fn id(&self) -> &str;
}

/// Replace the item whose id matches `id` in place. Returns whether a match
/// was found; unmatched ids leave the collection untouched.
pub fn splice_by_id<T: Identified>(items: &mut [T], id: &str, value: T) -> bool {
    match items.iter_mut().find(|item| item.id() == id) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

// =========================================================================
// Finance
// =========================================================================

/// Review status of an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    #[default]
    Open,
    Acknowledged,
    Resolved,
}

/// A metric observation that deviates from its expected range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub metric: String,
    pub value: f64,
    pub expected: f64,
    /// Standard deviations from the mean
    pub deviation: f64,
    pub severity: InsightLevel,
    pub status: AnomalyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl Identified for Anomaly {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinanceState {
    pub anomalies: Vec<Anomaly>,
    pub cash_position: Option<f64>,
    pub last_analysis: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct FinancePatch {
    pub anomalies: Option<Vec<Anomaly>>,
    pub cash_position: Option<f64>,
}

// =========================================================================
// Inventory
// =========================================================================

/// Demand forecast for one SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryPrediction {
    /// Keyed by SKU
    pub id: String,
    pub expected_qty: f64,
    pub on_hand: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub predicted_at: DateTime<Utc>,
}

impl InventoryPrediction {
    /// Units short of forecast demand, zero when covered
    pub fn shortfall(&self) -> f64 {
        (self.expected_qty - self.on_hand).max(0.0)
    }
}

impl Identified for InventoryPrediction {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryState {
    pub predictions: Vec<InventoryPrediction>,
    pub reorder_alerts: Vec<String>,
    pub last_analysis: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryPatch {
    pub predictions: Option<Vec<InventoryPrediction>>,
    pub reorder_alerts: Option<Vec<String>>,
}

// =========================================================================
// Production
// =========================================================================

/// One line of a bill of materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    pub id: String,
    pub parent_item: String,
    pub component: String,
    pub quantity_per: f64,
    pub unit_cost: f64,
    pub lead_time_days: u32,
}

impl Identified for BomLine {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionState {
    pub bom_lines: Vec<BomLine>,
    pub open_work_orders: u32,
    pub last_analysis: Option<DateTime<Utc>>,
}

impl ProductionState {
    /// Rolled-up material cost per parent item
    pub fn material_cost(&self, parent_item: &str) -> f64 {
        self.bom_lines
            .iter()
            .filter(|l| l.parent_item == parent_item)
            .map(|l| l.quantity_per * l.unit_cost)
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductionPatch {
    pub bom_lines: Option<Vec<BomLine>>,
    pub open_work_orders: Option<u32>,
}

// =========================================================================
// Sales
// =========================================================================

/// An open opportunity in the sales pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub account: String,
    pub stage: String,
    pub value: f64,
    /// Win probability in [0, 1]
    pub probability: f64,
}

impl Identified for Deal {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesState {
    pub deals: Vec<Deal>,
    pub pipeline_value: f64,
    pub last_analysis: Option<DateTime<Utc>>,
}

impl SalesState {
    /// Probability-weighted pipeline value
    pub fn weighted_pipeline(&self) -> f64 {
        self.deals.iter().map(|d| d.value * d.probability).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SalesPatch {
    pub deals: Option<Vec<Deal>>,
    pub pipeline_value: Option<f64>,
}

/// Read-only projection of every slice
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub finance: FinanceState,
    pub inventory: InventoryState,
    pub production: ProductionState,
    pub sales: SalesState,
    pub insight_count: usize,
    pub taken_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, parent: &str, qty: f64, cost: f64) -> BomLine {
        BomLine {
            id: id.to_string(),
            parent_item: parent.to_string(),
            component: format!("comp-{}", id),
            quantity_per: qty,
            unit_cost: cost,
            lead_time_days: 7,
        }
    }

    #[test]
    fn test_splice_by_id() {
        let mut lines = vec![line("a", "p", 1.0, 1.0), line("b", "p", 2.0, 1.0)];
        assert!(splice_by_id(&mut lines, "b", line("b", "p", 5.0, 1.0)));
        assert_eq!(lines[1].quantity_per, 5.0);

        let before = lines.clone();
        assert!(!splice_by_id(&mut lines, "zzz", line("zzz", "p", 9.0, 9.0)));
        assert_eq!(lines, before);
    }

    #[test]
    fn test_material_cost() {
        let state = ProductionState {
            bom_lines: vec![
                line("a", "widget", 2.0, 3.0),
                line("b", "widget", 1.0, 4.0),
                line("c", "gadget", 10.0, 10.0),
            ],
            ..Default::default()
        };
        assert_eq!(state.material_cost("widget"), 10.0);
    }

    #[test]
    fn test_shortfall_and_weighted_pipeline() {
        let p = InventoryPrediction {
            id: "sku-1".to_string(),
            expected_qty: 120.0,
            on_hand: 100.0,
            confidence: 0.8,
            reasoning: String::new(),
            predicted_at: Utc::now(),
        };
        assert_eq!(p.shortfall(), 20.0);

        let sales = SalesState {
            deals: vec![Deal {
                id: "d1".to_string(),
                account: "acme".to_string(),
                stage: "proposal".to_string(),
                value: 1000.0,
                probability: 0.25,
            }],
            ..Default::default()
        };
        assert_eq!(sales.weighted_pipeline(), 250.0);
    }

    #[test]
    fn test_domain_display() {
        assert_eq!(Domain::Inventory.to_string(), "inventory");
        assert_eq!(
            serde_json::to_string(&Domain::General).unwrap(),
            "\"general\""
        );
        assert_eq!(Domain::all().len(), 5);
    }
}
