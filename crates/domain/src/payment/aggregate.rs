//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{ActorId, AggregateId};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::ids::{ClientId, ProfessionalId};
use crate::money::{Money, Percentage};

use super::{
    AuditStamp, CreatePayment, DEFAULT_DESCRIPTION, PaymentError, PaymentEvent,
    PaymentHistoryEntry, PaymentMethod, PaymentState, QrInstruction, QrSettings, RevenueSplit,
    Settlement,
    events::{
        PartialPaymentAddedData, PaymentCompletedData, PaymentCreatedData, PaymentFailedData,
        PaymentRefundedData, QrGeneratedData, SplitCalculatedData,
    },
};

/// A payment with its split, QR instruction and audit history.
#[derive(Debug, Clone, Default)]
pub struct Payment {
    id: Option<AggregateId>,
    version: Version,

    code: String,
    amount: Money,
    amount_paid: Money,
    split: Option<RevenueSplit>,
    method: Option<PaymentMethod>,
    state: PaymentState,
    qr: Option<QrInstruction>,
    settlement: Option<Settlement>,

    description: String,
    notes: Option<String>,
    requires_invoice: bool,
    fiscal_id: Option<String>,
    legal_name: Option<String>,

    payer_id: Option<ClientId>,
    appointment_id: Option<AggregateId>,
    professional_id: Option<ProfessionalId>,
    processed_by: Option<ActorId>,
    refund_reason: Option<String>,

    created_at: Option<DateTime<Utc>>,
    settled_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,

    history: Vec<PaymentHistoryEntry>,
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
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
        let previous = self.id.map(|_| (self.state, self.amount_paid));
        let action = event.history_action();
        let audit = event.audit().clone();

        match event {
            PaymentEvent::PaymentCreated(data) => self.apply_created(data),
            PaymentEvent::SplitCalculated(data) => self.split = Some(data.split),
            PaymentEvent::QrGenerated(data) => self.qr = Some(data.qr),
            PaymentEvent::PartialPaymentAdded(data) => {
                self.amount_paid = data.amount_paid_after;
                if self.amount_paid >= self.amount {
                    self.state = PaymentState::Completed;
                    self.settled_at = Some(data.audit.recorded_at);
                } else {
                    self.state = PaymentState::Processing;
                }
            }
            PaymentEvent::PaymentCompleted(data) => {
                self.state = PaymentState::Completed;
                self.amount_paid = self.amount;
                self.settled_at = Some(data.audit.recorded_at);
                if data.settlement.processed_by.is_some() {
                    self.processed_by = data.settlement.processed_by.clone();
                }
                self.settlement = Some(data.settlement);
            }
            PaymentEvent::PaymentFailed(data) => {
                self.state = PaymentState::Failed;
                if let Some(reason) = data.reason {
                    let line = format!("Failed: {reason}");
                    self.notes = Some(match self.notes.take() {
                        Some(notes) => format!("{notes}\n{line}"),
                        None => line,
                    });
                }
            }
            PaymentEvent::PaymentRefunded(data) => {
                self.state = PaymentState::Refunded;
                self.refunded_at = Some(data.audit.recorded_at);
                self.refund_reason = data.reason;
                if data.processed_by.is_some() {
                    self.processed_by = data.processed_by;
                }
            }
        }

        if let Some(payment_id) = self.id {
            self.history.push(PaymentHistoryEntry {
                id: audit.entry_id,
                payment_id,
                action,
                previous_state: previous.map(|(state, _)| state),
                new_state: self.state,
                previous_amount: previous.map(|(_, amount)| amount),
                new_amount: self.amount_paid,
                description: audit.description,
                actor: audit.actor,
                at: audit.recorded_at,
            });
        }
    }
}

// Query methods
impl Payment {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    /// What is still owed; never negative.
    pub fn outstanding(&self) -> Money {
        self.amount.saturating_sub(self.amount_paid)
    }

    pub fn is_paid(&self) -> bool {
        self.state == PaymentState::Completed && self.amount_paid >= self.amount
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.method
    }

    pub fn method_label(&self) -> &'static str {
        self.method.map(|m| m.label()).unwrap_or("")
    }

    pub fn split(&self) -> Option<&RevenueSplit> {
        self.split.as_ref()
    }

    pub fn qr(&self) -> Option<&QrInstruction> {
        self.qr.as_ref()
    }

    /// `false` when no QR was ever generated.
    pub fn qr_is_expired(&self, now: DateTime<Utc>) -> bool {
        self.qr.as_ref().is_some_and(|qr| qr.is_expired(now))
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.settlement.as_ref()?.invoice_number.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn requires_invoice(&self) -> bool {
        self.requires_invoice
    }

    pub fn fiscal_id(&self) -> Option<&str> {
        self.fiscal_id.as_deref()
    }

    pub fn legal_name(&self) -> Option<&str> {
        self.legal_name.as_deref()
    }

    pub fn payer_id(&self) -> Option<ClientId> {
        self.payer_id
    }

    pub fn appointment_id(&self) -> Option<AggregateId> {
        self.appointment_id
    }

    pub fn professional_id(&self) -> Option<ProfessionalId> {
        self.professional_id
    }

    pub fn processed_by(&self) -> Option<&ActorId> {
        self.processed_by.as_ref()
    }

    pub fn refund_reason(&self) -> Option<&str> {
        self.refund_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    /// Past its due date and not paid.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| now > due) && !self.is_paid()
    }

    /// Audit trail, oldest first.
    pub fn history(&self) -> &[PaymentHistoryEntry] {
        &self.history
    }
}

// Command methods (return events)
impl Payment {
    /// Opens the payment under `code`, calculates its split and, for QR
    /// methods, generates the instruction.
    pub fn create(
        &self,
        cmd: &CreatePayment,
        code: String,
        qr_settings: &QrSettings,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyCreated);
        }
        if !cmd.amount.is_positive() {
            return Err(PaymentError::Validation(
                "amount must be greater than 0".to_string(),
            ));
        }
        if cmd.requires_invoice && cmd.fiscal_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
            return Err(PaymentError::Validation(
                "a fiscal id is required for invoicing".to_string(),
            ));
        }

        let description = cmd
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string();

        let split = RevenueSplit::calculate(
            cmd.amount,
            cmd.company_share.unwrap_or(super::DEFAULT_COMPANY_SHARE),
        );

        let mut events = vec![
            PaymentEvent::PaymentCreated(PaymentCreatedData {
                payment_id: cmd.payment_id,
                code: code.clone(),
                amount: cmd.amount,
                method: cmd.method,
                payer_id: cmd.payer_id,
                appointment_id: cmd.appointment_id,
                professional_id: cmd.professional_id,
                description: description.clone(),
                due_at: cmd.due_at,
                requires_invoice: cmd.requires_invoice,
                fiscal_id: cmd.fiscal_id.clone(),
                legal_name: cmd.legal_name.clone(),
                audit: AuditStamp::new(
                    cmd.actor.clone(),
                    format!("Payment {code} created for {} by {}", cmd.amount, cmd.method.label()),
                    now,
                ),
            }),
            split_event(split, cmd.actor.clone(), now),
        ];

        if cmd.method.is_qr() {
            let payload =
                QrInstruction::standard_payload(&code, cmd.amount, &description, qr_settings, now)?;
            let qr = QrInstruction::generate(payload, qr_settings, now)?;
            events.push(qr_event(qr, cmd.actor.clone(), now));
        }

        Ok(events)
    }

    /// Recomputes the split on the current total.
    pub fn recalculate_split(
        &self,
        company_share: Option<Percentage>,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_created()?;
        if matches!(self.state, PaymentState::Failed | PaymentState::Refunded) {
            return Err(self.invalid("recalculate split"));
        }
        let share = company_share
            .or(self.split.map(|s| s.company_share))
            .unwrap_or(super::DEFAULT_COMPANY_SHARE);
        Ok(vec![split_event(
            RevenueSplit::calculate(self.amount, share),
            actor,
            now,
        )])
    }

    /// Generates a fresh QR instruction, replacing any earlier one. Without
    /// a `payload` the standard JSON payload is used.
    pub fn generate_qr(
        &self,
        payload: Option<String>,
        settings: &QrSettings,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_created()?;
        let payload = match payload {
            Some(payload) => payload,
            None => QrInstruction::standard_payload(
                &self.code,
                self.amount,
                &self.description,
                settings,
                now,
            )?,
        };
        let qr = QrInstruction::generate(payload, settings, now)?;
        Ok(vec![qr_event(qr, actor, now)])
    }

    /// Accumulates `amount`; reaching the total completes the payment.
    pub fn add_partial_payment(
        &self,
        amount: Money,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_created()?;
        if !self.state.is_open() {
            return Err(self.invalid("add partial payment"));
        }
        let outstanding = self.outstanding();
        if !amount.is_positive() || amount > outstanding {
            return Err(PaymentError::InsufficientBalance {
                requested: amount,
                outstanding,
            });
        }

        let amount_paid_after = self.amount_paid + amount;
        let description = if amount_paid_after >= self.amount {
            format!("Partial payment of {amount} settles the balance")
        } else {
            format!(
                "Partial payment of {amount}, {} outstanding",
                self.amount - amount_paid_after
            )
        };
        Ok(vec![PaymentEvent::PartialPaymentAdded(
            PartialPaymentAddedData {
                amount,
                amount_paid_after,
                audit: AuditStamp::new(actor, description, now),
            },
        )])
    }

    pub fn mark_completed(
        &self,
        settlement: Settlement,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_created()?;
        if !self.state.is_open() {
            return Err(self.invalid("complete"));
        }
        if let Some(last4) = settlement.card_last4.as_deref()
            && (last4.len() != 4 || !last4.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(PaymentError::Validation(
                "card last digits must be exactly 4 digits".to_string(),
            ));
        }

        let actor = settlement.processed_by.clone().unwrap_or_else(ActorId::system);
        let description = match settlement.transaction_ref.as_deref() {
            Some(reference) => format!("Payment completed, transaction {reference}"),
            None => "Payment completed".to_string(),
        };
        Ok(vec![PaymentEvent::PaymentCompleted(PaymentCompletedData {
            settlement,
            audit: AuditStamp::new(actor, description, now),
        })])
    }

    pub fn mark_failed(
        &self,
        reason: Option<String>,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_created()?;
        if !self.state.is_open() {
            return Err(self.invalid("fail"));
        }
        let description = match reason.as_deref() {
            Some(reason) => format!("Payment failed: {reason}"),
            None => "Payment failed".to_string(),
        };
        Ok(vec![PaymentEvent::PaymentFailed(PaymentFailedData {
            reason,
            audit: AuditStamp::new(actor, description, now),
        })])
    }

    /// Only a completed payment can be refunded.
    pub fn refund(
        &self,
        reason: Option<String>,
        processed_by: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_created()?;
        if self.state != PaymentState::Completed {
            return Err(self.invalid("refund"));
        }
        let actor = processed_by.clone().unwrap_or_else(ActorId::system);
        let description = match reason.as_deref() {
            Some(reason) => format!("Refunded {}: {reason}", self.amount_paid),
            None => format!("Refunded {}", self.amount_paid),
        };
        Ok(vec![PaymentEvent::PaymentRefunded(PaymentRefundedData {
            reason,
            processed_by,
            audit: AuditStamp::new(actor, description, now),
        })])
    }

    fn ensure_created(&self) -> Result<(), PaymentError> {
        if self.id.is_none() {
            return Err(PaymentError::NotCreated);
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> PaymentError {
        PaymentError::InvalidStateTransition {
            current_state: self.state,
            action,
        }
    }
}

fn split_event(split: RevenueSplit, actor: ActorId, now: DateTime<Utc>) -> PaymentEvent {
    let description = format!(
        "Split calculated: clinic {} ({}), professional {} ({})",
        split.company_amount, split.company_share, split.professional_amount, split.professional_share
    );
    PaymentEvent::SplitCalculated(SplitCalculatedData {
        split,
        audit: AuditStamp::new(actor, description, now),
    })
}

fn qr_event(qr: QrInstruction, actor: ActorId, now: DateTime<Utc>) -> PaymentEvent {
    let description = format!("QR generated, valid until {}", qr.expires_at.to_rfc3339());
    PaymentEvent::QrGenerated(QrGeneratedData {
        qr,
        audit: AuditStamp::new(actor, description, now),
    })
}

// Event application
impl Payment {
    fn apply_created(&mut self, data: PaymentCreatedData) {
        self.id = Some(data.payment_id);
        self.code = data.code;
        self.amount = data.amount;
        self.amount_paid = Money::ZERO;
        self.method = Some(data.method);
        self.state = PaymentState::Pending;
        self.payer_id = Some(data.payer_id);
        self.appointment_id = data.appointment_id;
        self.professional_id = data.professional_id;
        self.description = data.description;
        self.due_at = data.due_at;
        self.requires_invoice = data.requires_invoice;
        self.fiscal_id = data.fiscal_id;
        self.legal_name = data.legal_name;
        self.created_at = Some(data.audit.recorded_at);
    }
}
