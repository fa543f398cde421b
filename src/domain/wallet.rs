use crate::domain::money::{Amount, Balance};
use crate::domain::vehicle::{PlateNumber, UserId};
use crate::error::{ParkingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's prepaid wallet, created lazily with a zero balance on
/// first reference. The balance is mutated only by settlement debits
/// and top-ups, both committed together with their ledger entry.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance: Balance,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Balance::ZERO,
        }
    }

    pub fn credit(&mut self, amount: Amount) {
        self.balance += amount.into();
    }

    /// Debits the wallet; the caller decides the insufficient-funds
    /// branch beforehand, so an uncovered debit here is a logic error.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        if self.balance.covers(amount) {
            self.balance -= amount.into();
            Ok(())
        } else {
            Err(ParkingError::ValidationError(
                "insufficient funds for debit".to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerEntryId(pub u64);

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum LedgerKind {
    Topup,
    Fee,
}

/// An immutable, append-only record of one wallet balance change.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub kind: LedgerKind,
    /// Signed: negative for fees, positive for top-ups.
    pub amount: Decimal,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// A ledger entry before the store has assigned it an id.
#[derive(Debug, PartialEq, Clone)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub kind: LedgerKind,
    pub amount: Decimal,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn fee(
        user_id: UserId,
        fee: Amount,
        plate: &PlateNumber,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            kind: LedgerKind::Fee,
            amount: -fee.value(),
            description: format!("Parking fee - {plate}"),
            recorded_at,
        }
    }

    pub fn topup(user_id: UserId, amount: Amount, recorded_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            kind: LedgerKind::Topup,
            amount: amount.value(),
            description: "Wallet top-up".to_string(),
            recorded_at,
        }
    }

    pub fn with_id(self, id: LedgerEntryId) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: self.user_id,
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            recorded_at: self.recorded_at,
        }
    }
}
