use chrono::{NaiveDate, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{Aggregate, DispenseReason, LotIntake, Medication, RegisterMedication};

/// A medication with `lots` lots of 10 units, expiries shuffled so the
/// draw order differs from receipt order. Every tenth lot is undated.
fn stocked_medication(lots: u32) -> Medication {
    let now = Utc::now();
    let mut medication = Medication::default();
    let events = medication
        .register(&RegisterMedication::named("Amoxicillin"), now)
        .unwrap();
    medication.apply_events(events);

    let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    for i in 0..lots {
        let mut intake = LotIntake::new(10).with_code(format!("L-{i:05}"));
        if i % 10 != 9 {
            let offset = (u64::from(i) * 7_919) % 3_650;
            intake = intake.expiring(base + chrono::Days::new(offset));
        }
        let events = medication.add_stock(&intake, now).unwrap();
        medication.apply_events(events);
    }
    medication
}

fn adjustment() -> DispenseReason {
    DispenseReason::Adjustment {
        note: "bench".to_string(),
    }
}

fn bench_plan_fefo(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory/dispense_plan");
    for lots in [10u32, 100, 1_000] {
        let medication = stocked_medication(lots);
        // Spans roughly half of the lots.
        let quantity = lots * 5;
        group.bench_with_input(BenchmarkId::from_parameter(lots), &medication, |b, m| {
            b.iter(|| m.dispense(quantity, adjustment(), Utc::now()).unwrap());
        });
    }
    group.finish();
}

fn bench_dispense_and_apply(c: &mut Criterion) {
    let medication = stocked_medication(500);

    c.bench_function("inventory/dispense_apply_500_lots", |b| {
        b.iter_batched(
            || medication.clone(),
            |mut m| {
                let events = m.dispense(2_000, adjustment(), Utc::now()).unwrap();
                m.apply_events(events);
                m
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_plan_fefo, bench_dispense_and_apply);
criterion_main!(benches);
