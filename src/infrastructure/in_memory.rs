use crate::domain::audit::AuditEvent;
use crate::domain::ports::{
    AuditLog, LedgerStore, SessionStore, SettlementStore, VehicleStore, WalletStore,
};
use crate::domain::session::{ParkingSession, RecognitionMethod, SessionId};
use crate::domain::vehicle::{LotId, PlateNumber, UserId, Vehicle, VehicleId};
use crate::domain::wallet::{LedgerEntry, LedgerEntryId, NewLedgerEntry, Wallet};
use crate::error::{ParkingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    vehicles: HashMap<VehicleId, Vehicle>,
    sessions: BTreeMap<SessionId, ParkingSession>,
    wallets: HashMap<UserId, Wallet>,
    ledger: Vec<LedgerEntry>,
    audit: Vec<AuditEvent>,
    next_vehicle_id: u32,
    next_session_id: u64,
    next_ledger_id: u64,
}

/// A thread-safe in-memory backend for all parking stores.
///
/// All tables live behind one `RwLock`, so a settlement commit takes a
/// single write lock and is trivially all-or-nothing. `Clone` shares
/// the underlying state, which lets one instance be boxed once per
/// store trait.
#[derive(Default, Clone)]
pub struct InMemoryParkingStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryParkingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/diagnostic view of the audit log.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.state.read().await.audit.clone()
    }
}

#[async_trait]
impl VehicleStore for InMemoryParkingStore {
    async fn insert(&self, plate: PlateNumber, owner: UserId) -> Result<Vehicle> {
        let mut state = self.state.write().await;
        if state.vehicles.values().any(|v| v.plate == plate) {
            return Err(ParkingError::DuplicatePlate(plate));
        }
        state.next_vehicle_id += 1;
        let vehicle = Vehicle {
            id: VehicleId(state.next_vehicle_id),
            plate,
            owner,
        };
        state.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn get_by_plate(&self, plate: &PlateNumber) -> Result<Option<Vehicle>> {
        let state = self.state.read().await;
        Ok(state.vehicles.values().find(|v| &v.plate == plate).cloned())
    }

    async fn all(&self) -> Result<Vec<Vehicle>> {
        let state = self.state.read().await;
        let mut vehicles: Vec<_> = state.vehicles.values().cloned().collect();
        vehicles.sort_by_key(|v| v.id);
        Ok(vehicles)
    }

    async fn remove(&self, id: VehicleId) -> Result<()> {
        let mut state = self.state.write().await;
        state.vehicles.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SessionStore for InMemoryParkingStore {
    async fn insert(
        &self,
        vehicle_id: VehicleId,
        lot_id: Option<LotId>,
        method: RecognitionMethod,
        entry_time: DateTime<Utc>,
    ) -> Result<ParkingSession> {
        let mut state = self.state.write().await;
        state.next_session_id += 1;
        let session = ParkingSession::open(
            SessionId(state.next_session_id),
            vehicle_id,
            lot_id,
            method,
            entry_time,
        );
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_open(&self, vehicle_id: VehicleId) -> Result<Option<ParkingSession>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .values()
            .find(|s| s.vehicle_id == vehicle_id && s.is_open())
            .cloned())
    }

    async fn get(&self, id: SessionId) -> Result<Option<ParkingSession>> {
        let state = self.state.read().await;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<ParkingSession>> {
        let state = self.state.read().await;
        Ok(state.sessions.values().cloned().collect())
    }
}

#[async_trait]
impl WalletStore for InMemoryParkingStore {
    async fn get_or_create(&self, user_id: UserId) -> Result<Wallet> {
        let mut state = self.state.write().await;
        Ok(state
            .wallets
            .entry(user_id)
            .or_insert_with(|| Wallet::new(user_id))
            .clone())
    }

    async fn all(&self) -> Result<Vec<Wallet>> {
        let state = self.state.read().await;
        let mut wallets: Vec<_> = state.wallets.values().cloned().collect();
        wallets.sort_by_key(|w| w.user_id);
        Ok(wallets)
    }
}

#[async_trait]
impl LedgerStore for InMemoryParkingStore {
    async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.ledger.clone())
    }
}

#[async_trait]
impl SettlementStore for InMemoryParkingStore {
    async fn commit_settlement(
        &self,
        session: ParkingSession,
        debit: Option<(Wallet, NewLedgerEntry)>,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        match state.sessions.get(&session.id) {
            None => {
                return Err(ParkingError::Storage(format!(
                    "unknown session {}",
                    session.id
                )));
            }
            Some(stored) if !stored.is_open() => {
                return Err(ParkingError::AlreadyClosed(session.id));
            }
            Some(_) => {}
        }

        // Single write lock held: all three effects land together.
        state.sessions.insert(session.id, session);
        if let Some((wallet, entry)) = debit {
            state.next_ledger_id += 1;
            let entry = entry.with_id(LedgerEntryId(state.next_ledger_id));
            state.wallets.insert(wallet.user_id, wallet);
            state.ledger.push(entry);
        }
        Ok(())
    }

    async fn commit_top_up(&self, wallet: Wallet, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let mut state = self.state.write().await;
        state.next_ledger_id += 1;
        let entry = entry.with_id(LedgerEntryId(state.next_ledger_id));
        state.wallets.insert(wallet.user_id, wallet);
        state.ledger.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl AuditLog for InMemoryParkingStore {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let mut state = self.state.write().await;
        state.audit.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::{Amount, Balance};
    use crate::domain::session::PaymentStatus;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_vehicle_store() {
        let store = InMemoryParkingStore::new();
        let plate = PlateNumber::new("49G1-11111").unwrap();

        let vehicle = VehicleStore::insert(&store, plate.clone(), UserId(1))
            .await
            .unwrap();
        let found = store.get_by_plate(&plate).await.unwrap().unwrap();
        assert_eq!(found, vehicle);

        let dup = VehicleStore::insert(&store, plate.clone(), UserId(2)).await;
        assert!(matches!(dup, Err(ParkingError::DuplicatePlate(_))));

        VehicleStore::remove(&store, vehicle.id).await.unwrap();
        assert!(store.get_by_plate(&plate).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wallet_lazy_creation() {
        let store = InMemoryParkingStore::new();
        let wallet = store.get_or_create(UserId(9)).await.unwrap();
        assert_eq!(wallet.balance, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_commit_settlement_rejects_closed_session() {
        let store = InMemoryParkingStore::new();
        let session = SessionStore::insert(
            &store,
            VehicleId(1),
            None,
            RecognitionMethod::Automatic,
            Utc::now(),
        )
        .await
        .unwrap();

        let fee = Amount::new(dec!(2000)).unwrap();
        let mut closed = session.clone();
        closed
            .close(Utc::now(), fee, PaymentStatus::Unpaid)
            .unwrap();
        store.commit_settlement(closed.clone(), None).await.unwrap();

        // Second commit for the same session must fail and write nothing.
        let mut wallet = Wallet::new(UserId(1));
        wallet.credit(fee);
        let entry = NewLedgerEntry::fee(
            UserId(1),
            fee,
            &PlateNumber::new("49G1-11111").unwrap(),
            Utc::now(),
        );
        let result = store
            .commit_settlement(closed, Some((wallet, entry)))
            .await;
        assert!(matches!(result, Err(ParkingError::AlreadyClosed(_))));
        assert!(LedgerStore::all(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_settlement_writes_all_three() {
        let store = InMemoryParkingStore::new();
        let session = SessionStore::insert(
            &store,
            VehicleId(1),
            None,
            RecognitionMethod::Automatic,
            Utc::now(),
        )
        .await
        .unwrap();

        let fee = Amount::new(dec!(2000)).unwrap();
        let mut closed = session.clone();
        closed.close(Utc::now(), fee, PaymentStatus::Paid).unwrap();
        let mut wallet = Wallet::new(UserId(1));
        wallet.credit(Amount::new(dec!(5000)).unwrap());
        wallet.debit(fee).unwrap();
        let entry = NewLedgerEntry::fee(
            UserId(1),
            fee,
            &PlateNumber::new("49G1-11111").unwrap(),
            Utc::now(),
        );

        store
            .commit_settlement(closed.clone(), Some((wallet, entry)))
            .await
            .unwrap();

        let stored = SessionStore::get(&store, session.id).await.unwrap().unwrap();
        assert_eq!(stored, closed);
        let wallet = store.get_or_create(UserId(1)).await.unwrap();
        assert_eq!(wallet.balance, Balance::new(dec!(3000)));
        assert_eq!(LedgerStore::all(&store).await.unwrap().len(), 1);
    }
}
