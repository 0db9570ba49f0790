//! Shared state for business-insight agents
//!
//! This module holds:
//! - Independent per-domain collections (finance, inventory, production, sales)
//! - A bounded, newest-first insight ring buffer
//!
//! # Architecture
//!
//! Every slice is owned by the [`StateStore`] and sits behind its own lock.
//! Callers only ever see clones:
//!
//! - `get_*_state()` returns a copy of the slice
//! - `update_*_state(patch)` merges the fields set in the patch
//! - item-level updates (`update_anomaly`, `update_bom_line`, ...) splice by id
//!   and silently ignore unknown ids
//!
//! # Usage
//!
//! ```ignore
//! use insight_coordination::state::{StateStore, FinancePatch};
//!
//! let store = StateStore::new().shared();
//! store.update_finance_state(FinancePatch { cash_position: Some(12_500.0), ..Default::default() });
//! let recent = store.get_insights(None, 20);
//! ```

pub mod insights;
pub mod store;
pub mod types;

pub use insights::{InsightBuffer, DEFAULT_INSIGHT_CAPACITY};
pub use store::{SharedStateStore, StateStore};
pub use types::{
    splice_by_id, Anomaly, AnomalyStatus, BomLine, Deal, Domain, FinancePatch, FinanceState,
    Identified, Insight, InsightId, InsightLevel, InventoryPatch, InventoryPrediction,
    InventoryState, ProductionPatch, ProductionState, SalesPatch, SalesState, StateSnapshot,
};
