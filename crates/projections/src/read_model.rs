//! Read model trait for query-side views.

/// Query access to a denormalized view.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Entries currently held: medications for the inventory alerts, payments
    /// for the ledger.
    fn count(&self) -> usize;
}
