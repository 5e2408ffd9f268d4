//! Clinic report entry point.
//!
//! Replays the event log into the read models and prints inventory alerts,
//! outstanding payments and revenue per professional. Pass `--json` for
//! machine-readable output.
//!
//! With `DATABASE_URL` set the report reads the Postgres log; otherwise it
//! runs against an in-memory store seeded with a short demo day.

use chrono::{Days, Utc};
use clinic::{ClinicConfig, ClinicCoordinator, ClinicReport, CompleteVisit};
use common::ActorId;
use domain::{
    AppointmentKind, ClientId, CreatePayment, LotIntake, Money, PatientId, PaymentMethod,
    PrescriptionItem, ProfessionalId, RegisterMedication, ScheduleAppointment, Settlement,
};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = ClinicConfig::from_env();
    clinic::telemetry::init(&config)?;
    let as_json = std::env::args().any(|arg| arg == "--json");

    let report = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("reading the Postgres event log");
            let store = PostgresEventStore::connect(url).await?;
            store.run_migrations().await?;
            ClinicReport::collect(store, &config, Utc::now().date_naive()).await?
        }
        None => {
            tracing::info!("DATABASE_URL not set, running the in-memory demo");
            let store = InMemoryEventStore::new();
            seed_demo(&ClinicCoordinator::new(store.clone(), &config)).await?;
            ClinicReport::collect(store, &config, Utc::now().date_naive()).await?
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print!("{report}");
    }
    Ok(())
}

/// One morning at the clinic: stock arrives, a visit is completed with a
/// prescription the shelf cannot cover and is part-paid, and a walk-in
/// pays in full.
async fn seed_demo<S>(clinic: &ClinicCoordinator<S>) -> Result<(), BoxError>
where
    S: EventStore + Clone,
{
    let today = Utc::now().date_naive();
    let in_days = |days: u64| today.checked_add_days(Days::new(days)).unwrap_or(today);
    let vet = ProfessionalId::new();
    let cashier = ActorId::new("front-desk");

    let amoxicillin = RegisterMedication::named("Amoxicillin 500mg").with_minimum_stock(5);
    let amoxicillin_id = amoxicillin.medication_id;
    clinic.inventory().register_medication(amoxicillin).await?;
    clinic
        .inventory()
        .add_stock(
            amoxicillin_id,
            LotIntake::new(5).with_code("AMX-01").expiring(in_days(10)),
        )
        .await?;
    clinic
        .inventory()
        .add_stock(
            amoxicillin_id,
            LotIntake::new(10).with_code("AMX-02").expiring(in_days(150)),
        )
        .await?;

    let meloxicam = RegisterMedication::named("Meloxicam 1.5mg/ml").with_minimum_stock(2);
    let meloxicam_id = meloxicam.medication_id;
    clinic.inventory().register_medication(meloxicam).await?;

    let schedule = ScheduleAppointment::new(
        PatientId::new(),
        ClientId::new(),
        AppointmentKind::Consultation,
        "Limping on the left hind leg",
        Utc::now(),
        Money::from_major(35),
    )
    .with_professional(vet);
    let appointment_id = schedule.appointment_id;
    let client_id = schedule.client_id;
    clinic.appointments().schedule(schedule).await?;
    clinic.appointments().start_treatment(appointment_id).await?;

    clinic
        .complete_visit(
            CompleteVisit::new(appointment_id, "Soft tissue sprain", "Rest and NSAIDs")
                .prescribe(
                    PrescriptionItem::new(amoxicillin_id, 8).with_dosage("1 tablet every 12h"),
                )
                .prescribe(PrescriptionItem::new(meloxicam_id, 1).with_duration("5 days"))
                .follow_up_on(in_days(7)),
        )
        .await?;

    let visit_payment =
        CreatePayment::new(Money::from_major(35), PaymentMethod::QrSimple, client_id)
            .for_appointment(appointment_id)
            .by(cashier.clone());
    let payment_id = visit_payment.payment_id;
    clinic.create_payment(visit_payment).await?;
    clinic
        .add_partial_payment(payment_id, Money::from_major(20), cashier.clone())
        .await?;

    let walk_in = CreatePayment::new(Money::from_major(12), PaymentMethod::Cash, ClientId::new())
        .with_professional(vet)
        .with_description("Nail trim");
    let walk_in_id = walk_in.payment_id;
    clinic.create_payment(walk_in).await?;
    clinic
        .settle_payment(walk_in_id, Settlement::new().processed_by(cashier))
        .await?;

    Ok(())
}
