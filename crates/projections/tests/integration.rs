//! Integration tests: domain services → ProjectionProcessor → both views.

use chrono::{NaiveDate, Utc};
use common::ActorId;
use domain::{
    Aggregate, ClientId, CreatePayment, DispenseReason, InventoryService, LotIntake, Money,
    PaymentMethod, PaymentService, PaymentState, ProfessionalId, QrSettings, RegisterMedication,
    Settlement,
};
use event_store::InMemoryEventStore;
use projections::{
    InventoryAlertsView, PaymentLedgerView, Projection, ProjectionProcessor, ReadModel,
};

struct Harness {
    inventory: InventoryService<InMemoryEventStore>,
    payments: PaymentService<InMemoryEventStore>,
    processor: ProjectionProcessor<InMemoryEventStore>,
    alerts: InventoryAlertsView,
    ledger: PaymentLedgerView,
}

fn setup() -> Harness {
    let store = InMemoryEventStore::new();
    let alerts = InventoryAlertsView::new();
    let ledger = PaymentLedgerView::new();

    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(alerts.clone()));
    processor.register(Box::new(ledger.clone()));

    Harness {
        inventory: InventoryService::new(store.clone()),
        payments: PaymentService::new(store, QrSettings::default()),
        processor,
        alerts,
        ledger,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn inventory_alerts_follow_the_ledger() {
    let h = setup();

    let cmd = RegisterMedication::named("Amoxicillin")
        .with_minimum_stock(5)
        .with_initial_stock(LotIntake::new(4).with_code("A-1").expiring(date(2025, 2, 1)));
    let medication_id = cmd.medication_id;
    h.inventory.register_medication(cmd).await.unwrap();
    h.inventory
        .add_stock(
            medication_id,
            LotIntake::new(10).with_code("A-2").expiring(date(2025, 8, 1)),
        )
        .await
        .unwrap();
    h.inventory
        .dispense(
            medication_id,
            9,
            DispenseReason::Adjustment {
                note: "monthly count".to_string(),
            },
        )
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();

    // 4 from A-1 then 5 from A-2 leaves 5, at the minimum.
    let restock = h.alerts.restock_needed().await;
    assert_eq!(restock.len(), 1);
    assert_eq!(restock[0].stock(), 5);

    let alerts = h.alerts.alerts(date(2025, 7, 15)).await;
    assert!(alerts.expired.is_empty(), "A-1 is empty, so it cannot alert");
    assert_eq!(alerts.near_expiry.len(), 1);
    assert_eq!(alerts.near_expiry[0].lot_code.as_deref(), Some("A-2"));
    assert_eq!(alerts.near_expiry[0].quantity, 5);
}

#[tokio::test]
async fn payment_ledger_tracks_balances_and_revenue() {
    let h = setup();
    let vet = ProfessionalId::new();

    let partial = h
        .payments
        .create_payment(
            CreatePayment::new(Money::from_major(100), PaymentMethod::Cash, ClientId::new())
                .with_professional(vet),
        )
        .await
        .unwrap();
    let partial_id = partial.aggregate.id().unwrap();
    h.payments
        .handler()
        .execute_existing(partial_id, |p| {
            p.add_partial_payment(Money::from_major(40), ActorId::new("cashier-1"), Utc::now())
        })
        .await
        .unwrap();

    let settled = h
        .payments
        .create_payment(
            CreatePayment::new(Money::from_major(35), PaymentMethod::QrSimple, ClientId::new())
                .with_professional(vet),
        )
        .await
        .unwrap();
    let settled_id = settled.aggregate.id().unwrap();
    h.payments
        .handler()
        .execute_existing(settled_id, |p| {
            p.mark_completed(Settlement::new().processed_by("cashier-1"), Utc::now())
        })
        .await
        .unwrap();

    h.processor.run_catch_up().await.unwrap();

    assert_eq!(h.ledger.total_outstanding().await, Money::from_major(60));
    let balances = h.ledger.outstanding_balances().await;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].state, PaymentState::Processing);

    let revenue = h.ledger.totals_by_professional().await;
    assert_eq!(revenue.len(), 1);
    assert_eq!(revenue[0].payments, 1);
    assert_eq!(
        revenue[0].company_total + revenue[0].professional_total,
        Money::from_major(35)
    );

    let stored = h.payments.list_history_for(settled_id).await.unwrap();
    assert_eq!(h.ledger.history_for(settled_id).await, stored);
}

#[tokio::test]
async fn catch_up_is_incremental() {
    let h = setup();

    h.payments
        .create_payment(CreatePayment::new(
            Money::from_major(20),
            PaymentMethod::Cash,
            ClientId::new(),
        ))
        .await
        .unwrap();
    let first = h.processor.run_catch_up().await.unwrap();

    h.payments
        .create_payment(CreatePayment::new(
            Money::from_major(30),
            PaymentMethod::Cash,
            ClientId::new(),
        ))
        .await
        .unwrap();
    let second = h.processor.run_catch_up().await.unwrap();

    assert!(second > first);
    assert_eq!(ReadModel::count(&h.ledger), 2);
    assert_eq!(h.ledger.position().await.events_processed, second);
    assert_eq!(h.alerts.position().await.events_processed, second);
    assert_eq!(h.ledger.total_outstanding().await, Money::from_major(50));
}

#[tokio::test]
async fn rebuild_reproduces_the_same_views() {
    let h = setup();

    let cmd = RegisterMedication::named("Meloxicam").with_minimum_stock(2);
    h.inventory.register_medication(cmd).await.unwrap();
    h.payments
        .create_payment(CreatePayment::new(
            Money::from_major(15),
            PaymentMethod::Cash,
            ClientId::new(),
        ))
        .await
        .unwrap();

    let events = h.processor.run_catch_up().await.unwrap();
    let before = h.ledger.total_outstanding().await;

    let rebuilt = h.processor.rebuild_all().await.unwrap();

    assert_eq!(rebuilt, events);
    assert_eq!(h.ledger.total_outstanding().await, before);
    assert_eq!(h.alerts.restock_needed().await.len(), 1);
}
