//! Read model views for the query side.

pub mod inventory_alerts;
pub mod payment_ledger;

pub use inventory_alerts::{
    DEFAULT_NEAR_EXPIRY_DAYS, ExpiryAlert, InventoryAlerts, InventoryAlertsView, LotStock,
    MedicationStock,
};
pub use payment_ledger::{OutstandingBalance, PaymentLedgerView, ProfessionalRevenue};
