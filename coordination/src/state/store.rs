//! Process-wide state store for domain slices and insights
//!
//! Each slice sits behind its own lock; getters hand out clones so callers
//! never alias internal storage. Partial updates merge only the fields set
//! in the patch and stamp `last_analysis`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::debug;

use super::insights::{InsightBuffer, DEFAULT_INSIGHT_CAPACITY};
use super::types::*;

/// Shared reference to StateStore
pub type SharedStateStore = Arc<StateStore>;

/// In-memory holder of per-domain collections and the insight ring
pub struct StateStore {
    finance: RwLock<FinanceState>,
    inventory: RwLock<InventoryState>,
    production: RwLock<ProductionState>,
    sales: RwLock<SalesState>,
    insights: RwLock<InsightBuffer>,
}

impl StateStore {
    /// Create a store with the default insight capacity
    pub fn new() -> Self {
        Self::with_insight_capacity(DEFAULT_INSIGHT_CAPACITY)
    }

    /// Create a store retaining at most `capacity` insights
    pub fn with_insight_capacity(capacity: usize) -> Self {
        Self {
            finance: RwLock::new(FinanceState::default()),
            inventory: RwLock::new(InventoryState::default()),
            production: RwLock::new(ProductionState::default()),
            sales: RwLock::new(SalesState::default()),
            insights: RwLock::new(InsightBuffer::new(capacity)),
        }
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedStateStore {
        Arc::new(self)
    }

    // =========================================================================
    // Finance
    // =========================================================================

    pub fn get_finance_state(&self) -> FinanceState {
        read(&self.finance).clone()
    }

    pub fn update_finance_state(&self, patch: FinancePatch) {
        let mut state = write(&self.finance);
        if let Some(anomalies) = patch.anomalies {
            state.anomalies = anomalies;
        }
        if let Some(cash) = patch.cash_position {
            state.cash_position = Some(cash);
        }
        state.last_analysis = Some(Utc::now());
        debug!(domain = "finance", "State slice updated");
    }

    /// Replace one anomaly by id. Returns whether it was found.
    pub fn update_anomaly(&self, id: &str, anomaly: Anomaly) -> bool {
        splice_by_id(&mut write(&self.finance).anomalies, id, anomaly)
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    pub fn get_inventory_state(&self) -> InventoryState {
        read(&self.inventory).clone()
    }

    pub fn update_inventory_state(&self, patch: InventoryPatch) {
        let mut state = write(&self.inventory);
        if let Some(predictions) = patch.predictions {
            state.predictions = predictions;
        }
        if let Some(alerts) = patch.reorder_alerts {
            state.reorder_alerts = alerts;
        }
        state.last_analysis = Some(Utc::now());
        debug!(domain = "inventory", "State slice updated");
    }

    /// Replace one prediction by SKU id. Returns whether it was found.
    pub fn update_prediction(&self, id: &str, prediction: InventoryPrediction) -> bool {
        splice_by_id(&mut write(&self.inventory).predictions, id, prediction)
    }

    // =========================================================================
    // Production
    // =========================================================================

    pub fn get_production_state(&self) -> ProductionState {
        read(&self.production).clone()
    }

    pub fn update_production_state(&self, patch: ProductionPatch) {
        let mut state = write(&self.production);
        if let Some(lines) = patch.bom_lines {
            state.bom_lines = lines;
        }
        if let Some(orders) = patch.open_work_orders {
            state.open_work_orders = orders;
        }
        state.last_analysis = Some(Utc::now());
        debug!(domain = "production", "State slice updated");
    }

    /// Replace one BOM line by id. Returns whether it was found.
    pub fn update_bom_line(&self, id: &str, line: BomLine) -> bool {
        splice_by_id(&mut write(&self.production).bom_lines, id, line)
    }

    // =========================================================================
    // Sales
    // =========================================================================

    pub fn get_sales_state(&self) -> SalesState {
        read(&self.sales).clone()
    }

    pub fn update_sales_state(&self, patch: SalesPatch) {
        let mut state = write(&self.sales);
        if let Some(deals) = patch.deals {
            state.deals = deals;
        }
        if let Some(value) = patch.pipeline_value {
            state.pipeline_value = value;
        }
        state.last_analysis = Some(Utc::now());
        debug!(domain = "sales", "State slice updated");
    }

    /// Replace one deal by id. Returns whether it was found.
    pub fn update_deal(&self, id: &str, deal: Deal) -> bool {
        splice_by_id(&mut write(&self.sales).deals, id, deal)
    }

    // =========================================================================
    // Insights
    // =========================================================================

    /// Prepend an insight, evicting the oldest beyond capacity
    pub fn add_insight(&self, insight: Insight) {
        debug!(insight_id = %insight.id, domain = %insight.domain, "Insight stored");
        write(&self.insights).add(insight);
    }

    /// Newest-first insights, optionally restricted to one domain
    pub fn get_insights(&self, domain: Option<Domain>, limit: usize) -> Vec<Insight> {
        read(&self.insights).get(domain, limit)
    }

    pub fn get_insight(&self, id: &str) -> Option<Insight> {
        read(&self.insights).find(id)
    }

    pub fn insight_count(&self) -> usize {
        read(&self.insights).len()
    }

    pub fn clear_insights(&self) {
        write(&self.insights).clear();
    }

    /// Read-only projection of every slice
    pub fn get_all_state(&self) -> StateSnapshot {
        StateSnapshot {
            finance: self.get_finance_state(),
            inventory: self.get_inventory_state(),
            production: self.get_production_state(),
            sales: self.get_sales_state(),
            insight_count: self.insight_count(),
            taken_at: Utc::now(),
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
