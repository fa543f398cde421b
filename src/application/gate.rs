use crate::application::locks::LockMap;
use crate::application::settlement::{Settlement, SettlementEngine};
use crate::application::tracker::SessionTracker;
use crate::domain::audit::AuditEvent;
use crate::domain::money::Amount;
use crate::domain::ports::{AuditLogBox, PlateRecognizerBox, VehicleStoreBox};
use crate::domain::session::{ParkingSession, RecognitionMethod};
use crate::domain::vehicle::{LotId, PlateNumber, UserId, Vehicle, VehicleId};
use crate::domain::wallet::Wallet;
use crate::error::{ParkingError, Result};

/// How a camera capture was routed after recognition.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Entered(ParkingSession),
    Exited(Settlement),
}

/// The boundary the HTTP layer (or the CLI) talks to.
///
/// Owns the per-vehicle and per-user lock registries that make entry,
/// exit and top-up linearizable per key: exit takes the vehicle lock
/// first, then the owner lock, always in that order.
pub struct ParkingGate {
    vehicles: VehicleStoreBox,
    tracker: SessionTracker,
    settlement: SettlementEngine,
    recognizer: PlateRecognizerBox,
    audit: AuditLogBox,
    vehicle_locks: LockMap<VehicleId>,
    user_locks: LockMap<UserId>,
}

impl ParkingGate {
    pub fn new(
        vehicles: VehicleStoreBox,
        tracker: SessionTracker,
        settlement: SettlementEngine,
        recognizer: PlateRecognizerBox,
        audit: AuditLogBox,
    ) -> Self {
        Self {
            vehicles,
            tracker,
            settlement,
            recognizer,
            audit,
            vehicle_locks: LockMap::new(),
            user_locks: LockMap::new(),
        }
    }

    pub async fn register_vehicle(&self, plate: PlateNumber, owner: UserId) -> Result<Vehicle> {
        let vehicle = self.vehicles.insert(plate, owner).await?;
        tracing::info!(plate = %vehicle.plate, owner = %owner, "vehicle registered");
        Ok(vehicle)
    }

    /// Vehicles are removable only while not parked.
    pub async fn remove_vehicle(&self, plate: &PlateNumber) -> Result<()> {
        let vehicle = self.lookup(plate).await?;
        let _guard = self.vehicle_locks.acquire(vehicle.id).await;
        if self.tracker.find_open_session(vehicle.id).await?.is_some() {
            return Err(ParkingError::VehicleInUse(vehicle.plate));
        }
        self.vehicles.remove(vehicle.id).await
    }

    pub async fn report_entry(
        &self,
        plate: &PlateNumber,
        lot_id: Option<LotId>,
        method: RecognitionMethod,
    ) -> Result<ParkingSession> {
        let vehicle = self.lookup(plate).await?;
        let _guard = self.vehicle_locks.acquire(vehicle.id).await;
        self.tracker.open_session(&vehicle, lot_id, method).await
    }

    pub async fn report_exit(&self, plate: &PlateNumber, lot_id: Option<LotId>) -> Result<Settlement> {
        let vehicle = self.lookup(plate).await?;
        let _vehicle_guard = self.vehicle_locks.acquire(vehicle.id).await;
        let _owner_guard = self.user_locks.acquire(vehicle.owner).await;
        self.settlement.settle_exit(&vehicle, lot_id).await
    }

    pub async fn top_up(&self, user_id: UserId, amount: Amount) -> Result<Wallet> {
        let _guard = self.user_locks.acquire(user_id).await;
        self.settlement.top_up(user_id, amount).await
    }

    /// Recognizes the plate on a camera frame and auto-routes the
    /// event: a parked vehicle exits, anything else enters. A failed
    /// or timed-out recognition call returns before any session state
    /// is touched, so it is safe to retry with the next frame.
    pub async fn report_capture(&self, image: &[u8], lot_id: Option<LotId>) -> Result<GateOutcome> {
        let reading = self.recognizer.recognize(image).await?;
        tracing::info!(
            plate = %reading.plate,
            confidence = reading.confidence,
            "plate recognized"
        );
        self.audit
            .record(AuditEvent::plate_recognized(
                &reading.plate,
                reading.confidence,
            ))
            .await?;

        let vehicle = self.lookup(&reading.plate).await?;
        // Routing is a hint; the operations re-validate the session
        // state under the vehicle lock.
        if self.tracker.find_open_session(vehicle.id).await?.is_some() {
            let settlement = self.report_exit(&reading.plate, lot_id).await?;
            Ok(GateOutcome::Exited(settlement))
        } else {
            let session = self
                .report_entry(&reading.plate, lot_id, RecognitionMethod::Automatic)
                .await?;
            Ok(GateOutcome::Entered(session))
        }
    }

    async fn lookup(&self, plate: &PlateNumber) -> Result<Vehicle> {
        self.vehicles
            .get_by_plate(plate)
            .await?
            .ok_or_else(|| ParkingError::VehicleNotFound(plate.clone()))
    }
}
