use crate::domain::session::{ParkingSession, PaymentStatus, SessionStatus};
use crate::domain::wallet::{LedgerEntry, LedgerKind, Wallet};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One row of the session history report. Stable column order:
/// timestamps come last so callers can match on the plate/fee prefix.
#[derive(Debug, Serialize)]
pub struct SessionRow<'a> {
    pub plate: &'a str,
    pub lot: Option<u32>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub fee: Option<Decimal>,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
}

impl<'a> SessionRow<'a> {
    pub fn new(session: &ParkingSession, plate: &'a str) -> Self {
        Self {
            plate,
            lot: session.lot_id.map(|l| l.0),
            status: session.status,
            payment_status: session.payment_status,
            fee: session.fee.map(|f| f.value()),
            entry_time: session.entry_time,
            exit_time: session.exit_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WalletRow {
    pub user: u32,
    pub balance: Decimal,
}

impl From<&Wallet> for WalletRow {
    fn from(wallet: &Wallet) -> Self {
        Self {
            user: wallet.user_id.0,
            balance: wallet.balance.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerRow<'a> {
    pub user: u32,
    pub kind: LedgerKind,
    pub amount: Decimal,
    pub description: &'a str,
}

impl<'a> From<&'a LedgerEntry> for LedgerRow<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            user: entry.user_id.0,
            kind: entry.kind,
            amount: entry.amount,
            description: &entry.description,
        }
    }
}

/// Writes the final report as CSV to any `Write` sink (e.g. stdout).
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_sessions<'a>(
        &mut self,
        rows: impl IntoIterator<Item = SessionRow<'a>>,
    ) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_wallets(&mut self, rows: impl IntoIterator<Item = WalletRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_ledger<'a>(
        &mut self,
        rows: impl IntoIterator<Item = LedgerRow<'a>>,
    ) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
