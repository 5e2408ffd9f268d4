//! Payment commands.

use chrono::{DateTime, Utc};
use common::{ActorId, AggregateId};
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, ProfessionalId};
use crate::money::{Money, Percentage};

use super::PaymentMethod;

/// Description used when the payer gives none.
pub const DEFAULT_DESCRIPTION: &str = "Veterinary services payment";

/// Opens a payment. The code is issued by the day's
/// [`PaymentCodeSequence`](super::PaymentCodeSequence).
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub payment_id: AggregateId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub payer_id: ClientId,
    pub appointment_id: Option<AggregateId>,
    pub professional_id: Option<ProfessionalId>,
    /// Defaults to 57.14%.
    pub company_share: Option<Percentage>,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub requires_invoice: bool,
    pub fiscal_id: Option<String>,
    pub legal_name: Option<String>,
    pub actor: ActorId,
}

impl CreatePayment {
    pub fn new(amount: Money, method: PaymentMethod, payer_id: ClientId) -> Self {
        Self {
            payment_id: AggregateId::new(),
            amount,
            method,
            payer_id,
            appointment_id: None,
            professional_id: None,
            company_share: None,
            description: None,
            due_at: None,
            requires_invoice: false,
            fiscal_id: None,
            legal_name: None,
            actor: ActorId::system(),
        }
    }

    pub fn for_appointment(mut self, appointment_id: AggregateId) -> Self {
        self.appointment_id = Some(appointment_id);
        self
    }

    pub fn with_professional(mut self, professional_id: ProfessionalId) -> Self {
        self.professional_id = Some(professional_id);
        self
    }

    pub fn with_company_share(mut self, share: Percentage) -> Self {
        self.company_share = Some(share);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_invoice(mut self, fiscal_id: impl Into<String>, legal_name: impl Into<String>) -> Self {
        self.requires_invoice = true;
        self.fiscal_id = Some(fiscal_id.into());
        self.legal_name = Some(legal_name.into());
        self
    }

    pub fn by(mut self, actor: impl Into<ActorId>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// References recorded when a payment is marked completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub transaction_ref: Option<String>,
    pub authorization_code: Option<String>,
    pub bank: Option<String>,
    /// Last four digits of the card, for card methods.
    pub card_last4: Option<String>,
    pub invoice_number: Option<String>,
    pub processed_by: Option<ActorId>,
}

impl Settlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction_ref(mut self, reference: impl Into<String>) -> Self {
        self.transaction_ref = Some(reference.into());
        self
    }

    pub fn with_authorization(mut self, code: impl Into<String>) -> Self {
        self.authorization_code = Some(code.into());
        self
    }

    pub fn with_card(mut self, bank: impl Into<String>, last4: impl Into<String>) -> Self {
        self.bank = Some(bank.into());
        self.card_last4 = Some(last4.into());
        self
    }

    pub fn with_invoice_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = Some(number.into());
        self
    }

    pub fn processed_by(mut self, actor: impl Into<ActorId>) -> Self {
        self.processed_by = Some(actor.into());
        self
    }
}
