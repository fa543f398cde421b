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
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const CF_VEHICLES: &str = "vehicles";
pub const CF_SESSIONS: &str = "sessions";
pub const CF_WALLETS: &str = "wallets";
pub const CF_LEDGER: &str = "ledger";
pub const CF_AUDIT: &str = "audit";

/// A persistent backend for all parking stores using RocksDB.
///
/// One Column Family per entity; records are serialized with
/// serde_json under big-endian id keys so iteration order matches id
/// order. The settlement commit goes through a single `WriteBatch`,
/// which RocksDB applies atomically.
///
/// `Clone` shares the underlying `Arc<DB>` and id counters.
#[derive(Clone)]
pub struct RocksDbParkingStore {
    db: Arc<DB>,
    next_vehicle_id: Arc<AtomicU64>,
    next_session_id: Arc<AtomicU64>,
    next_ledger_id: Arc<AtomicU64>,
    next_audit_id: Arc<AtomicU64>,
    // Serializes the scan-then-put uniqueness check in
    // `VehicleStore::insert`; without it two concurrent registrations
    // of the same plate could both pass the duplicate scan.
    vehicle_insert_lock: Arc<tokio::sync::Mutex<()>>,
}

impl RocksDbParkingStore {
    /// Opens or creates the database, ensuring all column families
    /// exist and recovering the id counters from the stored keys.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_VEHICLES, CF_SESSIONS, CF_WALLETS, CF_LEDGER, CF_AUDIT]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        let next_vehicle_id = Arc::new(AtomicU64::new(max_key(&db, CF_VEHICLES)?));
        let next_session_id = Arc::new(AtomicU64::new(max_key(&db, CF_SESSIONS)?));
        let next_ledger_id = Arc::new(AtomicU64::new(max_key(&db, CF_LEDGER)?));
        let next_audit_id = Arc::new(AtomicU64::new(max_key(&db, CF_AUDIT)?));

        Ok(Self {
            db: Arc::new(db),
            next_vehicle_id,
            next_session_id,
            next_ledger_id,
            next_audit_id,
            vehicle_insert_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ParkingError::Storage(format!("column family {name} not found")))
    }

    fn put<T: Serialize>(&self, cf: &str, key: u64, value: &T) -> Result<()> {
        let cf = self.cf(cf)?;
        self.db.put_cf(cf, key.to_be_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(&self, cf: &str, key: u64) -> Result<Option<T>> {
        let cf = self.cf(cf)?;
        match self.db.get_cf(cf, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

/// Highest id currently stored in a column family; 0 when empty.
fn max_key(db: &DB, cf: &str) -> Result<u64> {
    let cf = db
        .cf_handle(cf)
        .ok_or_else(|| ParkingError::Storage(format!("column family {cf} not found")))?;
    match db.iterator_cf(cf, IteratorMode::End).next() {
        Some(item) => {
            let (key, _value) = item?;
            let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                ParkingError::Storage("malformed key in column family".to_string())
            })?;
            Ok(u64::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

#[async_trait]
impl VehicleStore for RocksDbParkingStore {
    async fn insert(&self, plate: PlateNumber, owner: UserId) -> Result<Vehicle> {
        let _guard = self.vehicle_insert_lock.lock().await;
        let existing: Vec<Vehicle> = self.scan(CF_VEHICLES)?;
        if existing.iter().any(|v| v.plate == plate) {
            return Err(ParkingError::DuplicatePlate(plate));
        }

        let id = self.next_vehicle_id.fetch_add(1, Ordering::SeqCst) + 1;
        let vehicle = Vehicle {
            id: VehicleId(id as u32),
            plate,
            owner,
        };
        self.put(CF_VEHICLES, id, &vehicle)?;
        Ok(vehicle)
    }

    async fn get_by_plate(&self, plate: &PlateNumber) -> Result<Option<Vehicle>> {
        let vehicles: Vec<Vehicle> = self.scan(CF_VEHICLES)?;
        Ok(vehicles.into_iter().find(|v| &v.plate == plate))
    }

    async fn all(&self) -> Result<Vec<Vehicle>> {
        self.scan(CF_VEHICLES)
    }

    async fn remove(&self, id: VehicleId) -> Result<()> {
        let cf = self.cf(CF_VEHICLES)?;
        self.db.delete_cf(cf, u64::from(id.0).to_be_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RocksDbParkingStore {
    async fn insert(
        &self,
        vehicle_id: VehicleId,
        lot_id: Option<LotId>,
        method: RecognitionMethod,
        entry_time: DateTime<Utc>,
    ) -> Result<ParkingSession> {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session = ParkingSession::open(SessionId(id), vehicle_id, lot_id, method, entry_time);
        self.put(CF_SESSIONS, id, &session)?;
        Ok(session)
    }

    async fn find_open(&self, vehicle_id: VehicleId) -> Result<Option<ParkingSession>> {
        let sessions: Vec<ParkingSession> = self.scan(CF_SESSIONS)?;
        Ok(sessions
            .into_iter()
            .find(|s| s.vehicle_id == vehicle_id && s.is_open()))
    }

    async fn get(&self, id: SessionId) -> Result<Option<ParkingSession>> {
        self.get_record(CF_SESSIONS, id.0)
    }

    async fn all(&self) -> Result<Vec<ParkingSession>> {
        self.scan(CF_SESSIONS)
    }
}

#[async_trait]
impl WalletStore for RocksDbParkingStore {
    async fn get_or_create(&self, user_id: UserId) -> Result<Wallet> {
        if let Some(wallet) = self.get_record(CF_WALLETS, u64::from(user_id.0))? {
            return Ok(wallet);
        }
        let wallet = Wallet::new(user_id);
        self.put(CF_WALLETS, u64::from(user_id.0), &wallet)?;
        Ok(wallet)
    }

    async fn all(&self) -> Result<Vec<Wallet>> {
        self.scan(CF_WALLETS)
    }
}

#[async_trait]
impl LedgerStore for RocksDbParkingStore {
    async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self.scan(CF_LEDGER)?;
        Ok(entries.into_iter().filter(|e| e.user_id == user_id).collect())
    }

    async fn all(&self) -> Result<Vec<LedgerEntry>> {
        self.scan(CF_LEDGER)
    }
}

#[async_trait]
impl SettlementStore for RocksDbParkingStore {
    async fn commit_settlement(
        &self,
        session: ParkingSession,
        debit: Option<(Wallet, NewLedgerEntry)>,
    ) -> Result<()> {
        match self.get_record::<ParkingSession>(CF_SESSIONS, session.id.0)? {
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

        // One WriteBatch: RocksDB applies all puts or none.
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_SESSIONS)?,
            session.id.0.to_be_bytes(),
            serde_json::to_vec(&session)?,
        );
        if let Some((wallet, entry)) = debit {
            let id = self.next_ledger_id.fetch_add(1, Ordering::SeqCst) + 1;
            let entry = entry.with_id(LedgerEntryId(id));
            batch.put_cf(
                self.cf(CF_WALLETS)?,
                u64::from(wallet.user_id.0).to_be_bytes(),
                serde_json::to_vec(&wallet)?,
            );
            batch.put_cf(
                self.cf(CF_LEDGER)?,
                id.to_be_bytes(),
                serde_json::to_vec(&entry)?,
            );
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn commit_top_up(&self, wallet: Wallet, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        let id = self.next_ledger_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = entry.with_id(LedgerEntryId(id));

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_WALLETS)?,
            u64::from(wallet.user_id.0).to_be_bytes(),
            serde_json::to_vec(&wallet)?,
        );
        batch.put_cf(
            self.cf(CF_LEDGER)?,
            id.to_be_bytes(),
            serde_json::to_vec(&entry)?,
        );
        self.db.write(batch)?;
        Ok(entry)
    }
}

#[async_trait]
impl AuditLog for RocksDbParkingStore {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let id = self.next_audit_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.put(CF_AUDIT, id, &event)
    }
}
