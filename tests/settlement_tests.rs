mod common;

use common::gate_with;
use parkgate::domain::money::{Amount, Balance};
use parkgate::domain::ports::{LedgerStore, SessionStore, WalletStore};
use parkgate::domain::session::{PaymentStatus, RecognitionMethod, SessionStatus};
use parkgate::domain::vehicle::{LotId, PlateNumber, UserId};
use parkgate::domain::wallet::LedgerKind;
use parkgate::error::ParkingError;
use parkgate::infrastructure::in_memory::InMemoryParkingStore;
use rust_decimal_macros::dec;

fn plate() -> PlateNumber {
    PlateNumber::new("49G1-11111").unwrap()
}

#[tokio::test]
async fn test_checkout_with_sufficient_funds() {
    let store = InMemoryParkingStore::new();
    let gate = gate_with(&store);

    // V1 owned by U1, wallet 5000, lot 1 without a configured fee.
    gate.register_vehicle(plate(), UserId(1)).await.unwrap();
    gate.top_up(UserId(1), Amount::new(dec!(5000)).unwrap())
        .await
        .unwrap();
    gate.report_entry(&plate(), Some(LotId(1)), RecognitionMethod::Automatic)
        .await
        .unwrap();

    let settlement = gate.report_exit(&plate(), Some(LotId(1))).await.unwrap();

    assert!(!settlement.insufficient_funds);
    assert_eq!(settlement.fee.value(), dec!(2000));
    assert_eq!(settlement.balance, Balance::new(dec!(3000)));
    assert_eq!(settlement.session.status, SessionStatus::Out);
    assert_eq!(settlement.session.payment_status, PaymentStatus::Paid);
    assert!(settlement.session.exit_time.is_some());

    // Wallet debited by exactly the fee, one FEE ledger entry of -2000.
    let wallet = store.get_or_create(UserId(1)).await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(3000)));
    let fees: Vec<_> = store
        .entries_for(UserId(1))
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == LedgerKind::Fee)
        .collect();
    assert_eq!(fees.len(), 1);
    assert_eq!(fees[0].amount, dec!(-2000));
}

#[tokio::test]
async fn test_checkout_with_insufficient_funds() {
    let store = InMemoryParkingStore::new();
    let gate = gate_with(&store);

    gate.register_vehicle(plate(), UserId(1)).await.unwrap();
    gate.top_up(UserId(1), Amount::new(dec!(1000)).unwrap())
        .await
        .unwrap();
    gate.report_entry(&plate(), Some(LotId(1)), RecognitionMethod::Automatic)
        .await
        .unwrap();

    let settlement = gate.report_exit(&plate(), Some(LotId(1))).await.unwrap();

    // The exit succeeds operationally; the debt stays on the session.
    assert!(settlement.insufficient_funds);
    assert_eq!(settlement.balance, Balance::new(dec!(1000)));
    assert_eq!(settlement.fee.value(), dec!(2000));
    assert_eq!(settlement.session.payment_status, PaymentStatus::Unpaid);
    assert_eq!(settlement.session.fee, Some(settlement.fee));
    assert_eq!(settlement.session.status, SessionStatus::Out);

    // Wallet untouched and no ledger entry written.
    let wallet = store.get_or_create(UserId(1)).await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(1000)));
    let entries = store.entries_for(UserId(1)).await.unwrap();
    assert!(entries.iter().all(|e| e.kind != LedgerKind::Fee));
}

#[tokio::test]
async fn test_duplicate_entry_is_rejected_once() {
    let store = InMemoryParkingStore::new();
    let gate = gate_with(&store);

    gate.register_vehicle(plate(), UserId(1)).await.unwrap();

    let first = gate
        .report_entry(&plate(), Some(LotId(1)), RecognitionMethod::Automatic)
        .await;
    let second = gate
        .report_entry(&plate(), Some(LotId(1)), RecognitionMethod::Automatic)
        .await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(ParkingError::AlreadyCheckedIn)));

    let open: Vec<_> = SessionStore::all(&store)
        .await
        .unwrap()
        .into_iter()
        .filter(|s| s.is_open())
        .collect();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn test_exit_without_entry_mutates_nothing() {
    let store = InMemoryParkingStore::new();
    let gate = gate_with(&store);

    gate.register_vehicle(plate(), UserId(1)).await.unwrap();
    gate.top_up(UserId(1), Amount::new(dec!(5000)).unwrap())
        .await
        .unwrap();

    let result = gate.report_exit(&plate(), None).await;
    assert!(matches!(result, Err(ParkingError::NoOpenSession)));

    let wallet = store.get_or_create(UserId(1)).await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(5000)));
    assert!(SessionStore::all(&store).await.unwrap().is_empty());
    // Only the top-up is in the ledger.
    assert_eq!(LedgerStore::all(&store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_exit_for_unknown_plate() {
    let store = InMemoryParkingStore::new();
    let gate = gate_with(&store);

    let result = gate.report_exit(&plate(), None).await;
    assert!(matches!(result, Err(ParkingError::VehicleNotFound(_))));
}

#[tokio::test]
async fn test_full_cycle_repeats() {
    let store = InMemoryParkingStore::new();
    let gate = gate_with(&store);

    gate.register_vehicle(plate(), UserId(1)).await.unwrap();
    gate.top_up(UserId(1), Amount::new(dec!(5000)).unwrap())
        .await
        .unwrap();

    // Two full park-and-pay cycles.
    for _ in 0..2 {
        gate.report_entry(&plate(), Some(LotId(1)), RecognitionMethod::Automatic)
            .await
            .unwrap();
        gate.report_exit(&plate(), Some(LotId(1))).await.unwrap();
    }

    let wallet = store.get_or_create(UserId(1)).await.unwrap();
    assert_eq!(wallet.balance, Balance::new(dec!(1000)));
    let sessions = SessionStore::all(&store).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| !s.is_open()));
}
