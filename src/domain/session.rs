use crate::domain::money::Amount;
use crate::domain::vehicle::{LotId, VehicleId};
use crate::error::{ParkingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    In,
    Out,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionMethod {
    #[default]
    Automatic,
    Manual,
}

/// One continuous occupancy of a parking lot by one vehicle.
///
/// Created on entry with no exit time; mutated exactly once, on exit,
/// when the settlement engine records the fee and payment outcome.
/// Sessions are never deleted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ParkingSession {
    pub id: SessionId,
    pub vehicle_id: VehicleId,
    pub lot_id: Option<LotId>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub fee: Option<Amount>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub recognition_method: RecognitionMethod,
}

impl ParkingSession {
    pub fn open(
        id: SessionId,
        vehicle_id: VehicleId,
        lot_id: Option<LotId>,
        method: RecognitionMethod,
        entry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            vehicle_id,
            lot_id,
            entry_time,
            exit_time: None,
            fee: None,
            status: SessionStatus::In,
            payment_status: PaymentStatus::Unpaid,
            recognition_method: method,
        }
    }

    /// An open session has no recorded exit time; the vehicle is parked.
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    /// Records the exit outcome. Closing a session twice means the
    /// single-open-session contract was violated upstream, so this is
    /// surfaced as `AlreadyClosed` rather than silently overwritten.
    pub fn close(
        &mut self,
        exit_time: DateTime<Utc>,
        fee: Amount,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        if !self.is_open() {
            return Err(ParkingError::AlreadyClosed(self.id));
        }
        self.exit_time = Some(exit_time);
        self.fee = Some(fee);
        self.status = SessionStatus::Out;
        self.payment_status = payment_status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_session() -> ParkingSession {
        ParkingSession::open(
            SessionId(1),
            VehicleId(1),
            Some(LotId(1)),
            RecognitionMethod::Automatic,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_session_is_open() {
        let session = open_session();
        assert!(session.is_open());
        assert_eq!(session.status, SessionStatus::In);
        assert_eq!(session.payment_status, PaymentStatus::Unpaid);
        assert!(session.fee.is_none());
    }

    #[test]
    fn test_close_records_outcome() {
        let mut session = open_session();
        let fee = Amount::new(dec!(2000)).unwrap();
        session.close(Utc::now(), fee, PaymentStatus::Paid).unwrap();

        assert!(!session.is_open());
        assert_eq!(session.status, SessionStatus::Out);
        assert_eq!(session.payment_status, PaymentStatus::Paid);
        assert_eq!(session.fee, Some(fee));
    }

    #[test]
    fn test_double_close_is_fatal() {
        let mut session = open_session();
        let fee = Amount::new(dec!(2000)).unwrap();
        session
            .close(Utc::now(), fee, PaymentStatus::Unpaid)
            .unwrap();

        let result = session.close(Utc::now(), fee, PaymentStatus::Paid);
        assert!(matches!(result, Err(ParkingError::AlreadyClosed(_))));
        // First outcome is untouched.
        assert_eq!(session.payment_status, PaymentStatus::Unpaid);
    }
}
