//! Medication commands.

use common::AggregateId;

use crate::money::Money;

use super::LotIntake;

/// Adds a medication to the catalogue.
#[derive(Debug, Clone)]
pub struct RegisterMedication {
    pub medication_id: AggregateId,
    pub code: Option<String>,
    pub name: String,
    pub active_ingredient: Option<String>,
    pub presentation: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub purchase_price: Option<Money>,
    pub sale_price: Option<Money>,
    pub requires_prescription: bool,
    pub controlled: bool,
    /// Restock threshold; defaults to 5.
    pub minimum_stock: Option<u32>,
    /// Stock on hand at registration, recorded as the first lot.
    pub initial_stock: Option<LotIntake>,
}

impl RegisterMedication {
    pub fn new(medication_id: AggregateId, name: impl Into<String>) -> Self {
        Self {
            medication_id,
            code: None,
            name: name.into(),
            active_ingredient: None,
            presentation: None,
            category: None,
            unit: None,
            purchase_price: None,
            sale_price: None,
            requires_prescription: false,
            controlled: false,
            minimum_stock: None,
            initial_stock: None,
        }
    }

    /// Registers under a freshly generated id.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(AggregateId::new(), name)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_minimum_stock(mut self, minimum: u32) -> Self {
        self.minimum_stock = Some(minimum);
        self
    }

    pub fn with_initial_stock(mut self, intake: LotIntake) -> Self {
        self.initial_stock = Some(intake);
        self
    }

    pub fn with_prices(mut self, purchase: Money, sale: Money) -> Self {
        self.purchase_price = Some(purchase);
        self.sale_price = Some(sale);
        self
    }

    pub fn prescription_only(mut self) -> Self {
        self.requires_prescription = true;
        self
    }
}
