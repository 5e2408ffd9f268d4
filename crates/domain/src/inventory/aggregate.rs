//! Medication aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::ids::LotId;
use crate::money::Money;

use super::{
    DispenseReason, InventoryError, Lot, LotDraw, LotIntake, MedicationEvent, RegisterMedication,
    events::{MedicationRegisteredData, StockDispensedData},
    lot::fefo_cmp,
};

/// Minimum stock used when registration does not set one.
pub const DEFAULT_MINIMUM_STOCK: u32 = 5;

/// A stocked medication and its lots.
///
/// `stock` always equals the sum of lot quantities: both change only through
/// `LotReceived` and `StockDispensed`, and a dispense decrements `stock` by
/// the sum of its per-lot draws.
#[derive(Debug, Clone, Default)]
pub struct Medication {
    id: Option<AggregateId>,
    version: Version,

    code: Option<String>,
    name: String,
    active_ingredient: Option<String>,
    presentation: Option<String>,
    category: Option<String>,
    unit: Option<String>,
    purchase_price: Option<Money>,
    sale_price: Option<Money>,
    requires_prescription: bool,
    controlled: bool,
    active: bool,

    minimum_stock: u32,
    stock: u32,
    /// Receipt order.
    lots: Vec<Lot>,
    /// Soonest expiry seen on any received lot. Informational; not cleared
    /// when that lot empties.
    nearest_expiry: Option<NaiveDate>,

    registered_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Medication {
    type Event = MedicationEvent;
    type Error = InventoryError;

    fn aggregate_type() -> &'static str {
        "Medication"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            MedicationEvent::MedicationRegistered(data) => self.apply_registered(data),
            MedicationEvent::LotReceived(data) => {
                let lot = data.lot;
                if let Some(expiry) = lot.expires_on
                    && self.nearest_expiry.is_none_or(|current| expiry < current)
                {
                    self.nearest_expiry = Some(expiry);
                }
                self.stock = self.stock.saturating_add(lot.quantity);
                self.updated_at = Some(lot.received_at);
                self.lots.push(lot);
            }
            MedicationEvent::StockDispensed(data) => self.apply_dispensed(data),
            MedicationEvent::MedicationDeactivated(data) => {
                self.active = false;
                self.updated_at = Some(data.deactivated_at);
            }
        }
    }
}

// Query methods
impl Medication {
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn active_ingredient(&self) -> Option<&str> {
        self.active_ingredient.as_deref()
    }

    pub fn presentation(&self) -> Option<&str> {
        self.presentation.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn purchase_price(&self) -> Option<Money> {
        self.purchase_price
    }

    pub fn sale_price(&self) -> Option<Money> {
        self.sale_price
    }

    pub fn requires_prescription(&self) -> bool {
        self.requires_prescription
    }

    pub fn is_controlled(&self) -> bool {
        self.controlled
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn minimum_stock(&self) -> u32 {
        self.minimum_stock
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn nearest_expiry(&self) -> Option<NaiveDate> {
        self.nearest_expiry
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Lots in receipt order, including emptied ones.
    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn lot(&self, lot_id: LotId) -> Option<&Lot> {
        self.lots.iter().find(|l| l.id == lot_id)
    }

    /// All lots in the order a dispense would draw from them.
    pub fn lots_in_draw_order(&self) -> Vec<&Lot> {
        let mut lots: Vec<&Lot> = self.lots.iter().collect();
        lots.sort_by(|a, b| fefo_cmp(a, b));
        lots
    }

    pub fn sum_of_lots(&self) -> u32 {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    /// Any lot with stock at or past its expiry date.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.lots.iter().any(|l| l.is_expired(today))
    }

    pub fn is_near_expiry(&self, today: NaiveDate, days: u32) -> bool {
        self.lots.iter().any(|l| l.is_near_expiry(today, days))
    }

    pub fn needs_restock(&self) -> bool {
        self.stock <= self.minimum_stock
    }

    /// Plans which lots a dispense of `quantity` draws from, without changing
    /// anything.
    fn plan_draws(&self, quantity: u32) -> Vec<LotDraw> {
        let mut remaining = quantity;
        let mut draws = Vec::new();
        for lot in self.lots_in_draw_order() {
            if remaining == 0 {
                break;
            }
            if lot.is_empty() {
                continue;
            }
            let take = lot.quantity.min(remaining);
            draws.push(LotDraw {
                lot_id: lot.id,
                quantity: take,
            });
            remaining -= take;
        }
        draws
    }
}

// Command methods (return events)
impl Medication {
    /// Registers the medication. A positive `initial_stock` is recorded as
    /// its first lot.
    pub fn register(
        &self,
        cmd: &RegisterMedication,
        now: DateTime<Utc>,
    ) -> Result<Vec<MedicationEvent>, InventoryError> {
        if self.id.is_some() {
            return Err(InventoryError::AlreadyRegistered);
        }
        if cmd.name.trim().is_empty() {
            return Err(InventoryError::Validation(
                "medication name is required".to_string(),
            ));
        }

        let mut events = vec![MedicationEvent::MedicationRegistered(
            MedicationRegisteredData {
                medication_id: cmd.medication_id,
                code: cmd.code.clone(),
                name: cmd.name.trim().to_string(),
                active_ingredient: cmd.active_ingredient.clone(),
                presentation: cmd.presentation.clone(),
                category: cmd.category.clone(),
                unit: cmd.unit.clone(),
                purchase_price: cmd.purchase_price,
                sale_price: cmd.sale_price,
                requires_prescription: cmd.requires_prescription,
                controlled: cmd.controlled,
                minimum_stock: cmd.minimum_stock.unwrap_or(DEFAULT_MINIMUM_STOCK),
                registered_at: now,
            },
        )];

        if let Some(intake) = cmd.initial_stock.as_ref().filter(|i| i.quantity > 0) {
            events.push(MedicationEvent::lot_received(new_lot(intake, now)));
        }

        Ok(events)
    }

    /// Receives a new lot. Lots are never merged, even with equal expiry.
    pub fn add_stock(
        &self,
        intake: &LotIntake,
        now: DateTime<Utc>,
    ) -> Result<Vec<MedicationEvent>, InventoryError> {
        self.ensure_active()?;
        if intake.quantity == 0 {
            return Err(InventoryError::Validation(
                "received quantity must be greater than 0".to_string(),
            ));
        }
        if self.stock.checked_add(intake.quantity).is_none() {
            return Err(InventoryError::Validation(format!(
                "receiving {} units would overflow the stock of {}",
                intake.quantity, self.stock
            )));
        }

        Ok(vec![MedicationEvent::lot_received(new_lot(intake, now))])
    }

    /// Draws `quantity` first-expired-first-out.
    ///
    /// Lots past their expiry are drawn like any other; expiry only orders
    /// them. Fails without events if the stock cannot cover the request.
    pub fn dispense(
        &self,
        quantity: u32,
        reason: DispenseReason,
        now: DateTime<Utc>,
    ) -> Result<Vec<MedicationEvent>, InventoryError> {
        self.ensure_active()?;
        if quantity == 0 {
            return Err(InventoryError::Validation(
                "dispensed quantity must be greater than 0".to_string(),
            ));
        }
        if self.stock < quantity {
            return Err(InventoryError::InsufficientStock {
                available: self.stock,
                requested: quantity,
            });
        }

        let draws = self.plan_draws(quantity);
        Ok(vec![MedicationEvent::stock_dispensed(draws, reason, now)])
    }

    /// Manual stock correction, drawn in the same order as a dispense.
    pub fn withdraw(
        &self,
        quantity: u32,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MedicationEvent>, InventoryError> {
        let note = note.into();
        if note.trim().is_empty() {
            return Err(InventoryError::Validation(
                "a withdrawal needs a note".to_string(),
            ));
        }
        self.dispense(quantity, DispenseReason::Adjustment { note }, now)
    }

    /// Retires the medication from the catalogue. Idempotent.
    pub fn deactivate(&self, now: DateTime<Utc>) -> Result<Vec<MedicationEvent>, InventoryError> {
        if self.id.is_none() {
            return Err(InventoryError::NotRegistered);
        }
        if !self.active {
            return Ok(vec![]);
        }
        Ok(vec![MedicationEvent::medication_deactivated(now)])
    }

    fn ensure_active(&self) -> Result<(), InventoryError> {
        if self.id.is_none() {
            return Err(InventoryError::NotRegistered);
        }
        if !self.active {
            return Err(InventoryError::Inactive);
        }
        Ok(())
    }
}

fn new_lot(intake: &LotIntake, now: DateTime<Utc>) -> Lot {
    Lot {
        id: LotId::new(),
        code: intake.code.clone(),
        quantity: intake.quantity,
        expires_on: intake.expires_on,
        purchase_price: intake.purchase_price,
        received_at: now,
    }
}

// Event application
impl Medication {
    fn apply_registered(&mut self, data: MedicationRegisteredData) {
        self.id = Some(data.medication_id);
        self.code = data.code;
        self.name = data.name;
        self.active_ingredient = data.active_ingredient;
        self.presentation = data.presentation;
        self.category = data.category;
        self.unit = data.unit;
        self.purchase_price = data.purchase_price;
        self.sale_price = data.sale_price;
        self.requires_prescription = data.requires_prescription;
        self.controlled = data.controlled;
        self.minimum_stock = data.minimum_stock;
        self.active = true;
        self.registered_at = Some(data.registered_at);
        self.updated_at = Some(data.registered_at);
    }

    fn apply_dispensed(&mut self, data: StockDispensedData) {
        let mut drawn = 0;
        for draw in &data.draws {
            if let Some(lot) = self.lots.iter_mut().find(|l| l.id == draw.lot_id) {
                let take = draw.quantity.min(lot.quantity);
                lot.quantity -= take;
                drawn += take;
            }
        }
        self.stock = self.stock.saturating_sub(drawn);
        self.updated_at = Some(data.dispensed_at);
    }
}
