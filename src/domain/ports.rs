use crate::domain::audit::AuditEvent;
use crate::domain::session::{ParkingSession, RecognitionMethod, SessionId};
use crate::domain::vehicle::{LotId, PlateNumber, UserId, Vehicle, VehicleId};
use crate::domain::wallet::{LedgerEntry, NewLedgerEntry, Wallet};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Registers a vehicle; fails with `DuplicatePlate` if the plate is taken.
    async fn insert(&self, plate: PlateNumber, owner: UserId) -> Result<Vehicle>;
    async fn get_by_plate(&self, plate: &PlateNumber) -> Result<Option<Vehicle>>;
    async fn all(&self) -> Result<Vec<Vehicle>>;
    async fn remove(&self, id: VehicleId) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an open session row and assigns its id. The caller is
    /// responsible for the single-open-session check under the
    /// vehicle's lock; the store does not re-verify it.
    async fn insert(
        &self,
        vehicle_id: VehicleId,
        lot_id: Option<LotId>,
        method: RecognitionMethod,
        entry_time: DateTime<Utc>,
    ) -> Result<ParkingSession>;
    async fn find_open(&self, vehicle_id: VehicleId) -> Result<Option<ParkingSession>>;
    async fn get(&self, id: SessionId) -> Result<Option<ParkingSession>>;
    async fn all(&self) -> Result<Vec<ParkingSession>>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Lazy initialization: a missing wallet is created with a zero
    /// balance, not reported as an error.
    async fn get_or_create(&self, user_id: UserId) -> Result<Wallet>;
    async fn all(&self) -> Result<Vec<Wallet>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn entries_for(&self, user_id: UserId) -> Result<Vec<LedgerEntry>>;
    async fn all(&self) -> Result<Vec<LedgerEntry>>;
}

/// The atomic commit unit of the settlement engine.
///
/// Both operations must be all-or-nothing in every backend: a crash or
/// conflict mid-commit must never leave a wallet debited without its
/// ledger entry and closed session, or vice versa.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Persists a settlement outcome: the closed `session`, and, when
    /// funds were sufficient, the debited wallet plus its `FEE` ledger
    /// entry. Fails with `AlreadyClosed` if the stored session was
    /// closed by someone else; nothing is written in that case.
    async fn commit_settlement(
        &self,
        session: ParkingSession,
        debit: Option<(Wallet, NewLedgerEntry)>,
    ) -> Result<()>;

    /// Persists a top-up: the credited wallet plus its `TOPUP` ledger
    /// entry, as one unit.
    async fn commit_top_up(&self, wallet: Wallet, entry: NewLedgerEntry) -> Result<LedgerEntry>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Result of a plate-recognition call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
    pub plate: PlateNumber,
    pub confidence: f64,
}

/// The external recognition collaborator. Implementations must be
/// bounded by a timeout; a failed or timed-out call touches no session
/// state and is safely retriable.
#[async_trait]
pub trait PlateRecognizer: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<PlateReading>;
}

pub type VehicleStoreBox = Box<dyn VehicleStore>;
pub type SessionStoreBox = Box<dyn SessionStore>;
pub type WalletStoreBox = Box<dyn WalletStore>;
pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type SettlementStoreBox = Box<dyn SettlementStore>;
pub type AuditLogBox = Box<dyn AuditLog>;
pub type PlateRecognizerBox = Box<dyn PlateRecognizer>;
