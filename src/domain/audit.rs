use crate::domain::money::Amount;
use crate::domain::vehicle::PlateNumber;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum AuditKind {
    Recognition,
    Payment,
}

/// An append-only system log entry for auditing. Written on entry,
/// exit and recognition events; never read back by the core.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn vehicle_entered(plate: &PlateNumber) -> Self {
        Self {
            kind: AuditKind::Recognition,
            message: format!("Vehicle entered: {plate}"),
            at: Utc::now(),
        }
    }

    pub fn vehicle_exited(plate: &PlateNumber, fee: Amount, paid: bool) -> Self {
        let message = if paid {
            format!("Vehicle exited: {plate}, fee {fee} charged")
        } else {
            format!("Vehicle exited: {plate}, fee {fee} outstanding")
        };
        Self {
            kind: AuditKind::Payment,
            message,
            at: Utc::now(),
        }
    }

    pub fn plate_recognized(plate: &PlateNumber, confidence: f64) -> Self {
        Self {
            kind: AuditKind::Recognition,
            message: format!("Plate recognized: {plate} (confidence {confidence:.2})"),
            at: Utc::now(),
        }
    }
}
