//! # Billing Surface
//!
//! The in-app purchase flow lives in platform code; the core only defines
//! the surface it talks through. A provider lists its SKUs, launches a
//! purchase and eventually reports completion back to the model, which
//! raises [`crate::ModelEvent::PaymentDone`] for the UI.

/// One purchasable package as the store describes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sku {
    /// Store-side product identifier.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Crystals granted on purchase.
    pub crystals: u32,
}

/// Platform billing provider. Implementations are opaque to the core:
/// purchase results arrive asynchronously through
/// [`crate::Model::payment_done`].
pub trait BillingProvider: Send + Sync {
    /// The packages currently on sale.
    fn skus(&self) -> Vec<Sku>;

    /// Starts the platform purchase flow for `sku_id`. Fire-and-forget.
    fn purchase(&self, sku_id: &str);

    /// Consumes a completed purchase so it can be bought again.
    fn consume(&self, sku_id: &str);
}
