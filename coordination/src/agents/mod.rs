//! Concrete domain workers built on the [`Agent`](crate::agent::Agent)
//! contract.

pub mod finance;
pub mod inventory;
pub mod persona;

pub use finance::{FinanceScout, DETECT_ANOMALIES, FINANCE_SCOUT_ID};
pub use inventory::{history_confidence, InventoryForecaster, FORECAST_DEMAND, INVENTORY_FORECASTER_ID};
pub use persona::{PersonaAgent, DEBATE_ROUND};
