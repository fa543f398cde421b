use crate::domain::session::SessionId;
use crate::domain::vehicle::PlateNumber;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParkingError>;

#[derive(Error, Debug)]
pub enum ParkingError {
    #[error("vehicle not found: {0}")]
    VehicleNotFound(PlateNumber),
    #[error("license plate already registered: {0}")]
    DuplicatePlate(PlateNumber),
    #[error("vehicle {0} has an open parking session")]
    VehicleInUse(PlateNumber),
    #[error("vehicle is already checked in")]
    AlreadyCheckedIn,
    #[error("no open parking session for this vehicle")]
    NoOpenSession,
    #[error("session {0} is already closed")]
    AlreadyClosed(SessionId),
    #[error("settlement failed after {attempts} attempts: {source}")]
    SettlementFailed {
        attempts: u32,
        #[source]
        source: Box<ParkingError>,
    },
    #[error("plate recognition failed: {0}")]
    RecognitionFailed(String),
    #[error("plate recognition timed out after {0:?}")]
    RecognitionTimeout(Duration),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("storage conflict")]
    Conflict,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl ParkingError {
    /// Transient storage failures; the settlement engine retries these
    /// before giving up with `SettlementFailed`.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ParkingError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
