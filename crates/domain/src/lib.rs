//! Domain layer of the clinic.
//!
//! Three event-sourced components:
//! - [`appointment`]: the visit state machine
//! - [`inventory`]: medications with expiry-dated lots, depleted first-expired-first-out
//! - [`payment`]: settlement with revenue split, partial payments, refunds and QR instructions
//!
//! Commands are pure functions of aggregate state that return events; the
//! [`UnitOfWork`] collects events from several aggregates and commits them
//! in one atomic write.

pub mod aggregate;
pub mod appointment;
pub mod command;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod money;
pub mod payment;

pub use aggregate::{Aggregate, DomainEvent};
pub use appointment::{
    Appointment, AppointmentError, AppointmentEvent, AppointmentKind, AppointmentService,
    AppointmentState, AppointmentTransition, CompletionRecord, DispensationOutcome, Prescription,
    PrescriptionItem, ScheduleAppointment, Urgency,
};
pub use command::{CommandHandler, CommandResult, UnitOfWork};
pub use error::{DomainError, ErrorKind};
pub use ids::{ClientId, LotId, PatientId, PrescriptionId, ProfessionalId};
pub use inventory::{
    DispenseReason, InventoryError, InventoryService, Lot, LotDraw, LotIntake, Medication,
    MedicationEvent, RegisterMedication,
};
pub use money::{Money, MoneyParseError, Percentage};
pub use payment::{
    AuditStamp, CreatePayment, HistoryAction, Payment, PaymentCodeSequence, PaymentError,
    PaymentEvent, PaymentHistoryEntry, PaymentMethod, PaymentService, PaymentState, QrInstruction,
    QrSettings, RevenueSplit, Settlement,
};
