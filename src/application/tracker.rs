use crate::domain::audit::AuditEvent;
use crate::domain::ports::{AuditLogBox, SessionStoreBox};
use crate::domain::session::{ParkingSession, RecognitionMethod};
use crate::domain::vehicle::{LotId, Vehicle, VehicleId};
use crate::error::{ParkingError, Result};
use chrono::Utc;

/// Maintains the authoritative parking state per vehicle: whether it
/// currently occupies a lot (open session) and the session history.
///
/// Callers must hold the vehicle's lock around `open_session` so that
/// the open-session check and the insert form one atomic unit.
pub struct SessionTracker {
    sessions: SessionStoreBox,
    audit: AuditLogBox,
}

impl SessionTracker {
    pub fn new(sessions: SessionStoreBox, audit: AuditLogBox) -> Self {
        Self { sessions, audit }
    }

    /// Opens a session for the vehicle. Duplicate recognition events
    /// (a camera firing twice) surface as `AlreadyCheckedIn` and must
    /// not create a second open session.
    pub async fn open_session(
        &self,
        vehicle: &Vehicle,
        lot_id: Option<LotId>,
        method: RecognitionMethod,
    ) -> Result<ParkingSession> {
        if self.sessions.find_open(vehicle.id).await?.is_some() {
            return Err(ParkingError::AlreadyCheckedIn);
        }

        let session = self
            .sessions
            .insert(vehicle.id, lot_id, method, Utc::now())
            .await?;
        // The session exists at this point; a failing audit sink must
        // not make the check-in look rejected.
        if let Err(e) = self
            .audit
            .record(AuditEvent::vehicle_entered(&vehicle.plate))
            .await
        {
            tracing::warn!(error = %e, "audit append failed after check-in");
        }
        tracing::info!(
            plate = %vehicle.plate,
            session = %session.id,
            lot = ?lot_id,
            "vehicle checked in"
        );
        Ok(session)
    }

    /// `None` is the expected state for an exit event on an unparked
    /// vehicle, not a fault.
    pub async fn find_open_session(&self, vehicle_id: VehicleId) -> Result<Option<ParkingSession>> {
        self.sessions.find_open(vehicle_id).await
    }

    pub async fn history(&self) -> Result<Vec<ParkingSession>> {
        self.sessions.all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vehicle::{PlateNumber, UserId};
    use crate::infrastructure::in_memory::InMemoryParkingStore;

    fn tracker(store: &InMemoryParkingStore) -> SessionTracker {
        SessionTracker::new(Box::new(store.clone()), Box::new(store.clone()))
    }

    fn vehicle() -> Vehicle {
        Vehicle {
            id: VehicleId(1),
            plate: PlateNumber::new("49G1-11111").unwrap(),
            owner: UserId(1),
        }
    }

    #[tokio::test]
    async fn test_open_session() {
        let store = InMemoryParkingStore::new();
        let tracker = tracker(&store);

        let session = tracker
            .open_session(&vehicle(), Some(LotId(1)), RecognitionMethod::Automatic)
            .await
            .unwrap();
        assert!(session.is_open());

        let found = tracker.find_open_session(VehicleId(1)).await.unwrap();
        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected() {
        let store = InMemoryParkingStore::new();
        let tracker = tracker(&store);
        let vehicle = vehicle();

        tracker
            .open_session(&vehicle, None, RecognitionMethod::Automatic)
            .await
            .unwrap();
        let second = tracker
            .open_session(&vehicle, None, RecognitionMethod::Automatic)
            .await;
        assert!(matches!(second, Err(ParkingError::AlreadyCheckedIn)));

        // Exactly one open session exists.
        let open: Vec<_> = tracker
            .history()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.is_open())
            .collect();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_unparked_vehicle_has_no_open_session() {
        let store = InMemoryParkingStore::new();
        let tracker = tracker(&store);

        let found = tracker.find_open_session(VehicleId(42)).await.unwrap();
        assert!(found.is_none());
    }
}
