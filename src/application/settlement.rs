use crate::domain::audit::AuditEvent;
use crate::domain::fees::FeeSchedule;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{AuditLogBox, SessionStoreBox, SettlementStoreBox, WalletStoreBox};
use crate::domain::session::{ParkingSession, PaymentStatus};
use crate::domain::vehicle::{LotId, UserId, Vehicle};
use crate::domain::wallet::{NewLedgerEntry, Wallet};
use crate::error::{ParkingError, Result};
use chrono::Utc;
use std::time::Duration;

/// Bounded retry for transient storage conflicts during the commit.
const MAX_COMMIT_ATTEMPTS: u32 = 3;
const COMMIT_BACKOFF: Duration = Duration::from_millis(20);

/// The outcome of settling an exit event.
///
/// `insufficient_funds` is a result field, not a failure: the vehicle
/// exits either way, with the debt left on the session when the wallet
/// could not cover the fee.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub session: ParkingSession,
    pub fee: Amount,
    pub insufficient_funds: bool,
    /// Balance after settlement; unchanged on the insufficient path.
    pub balance: Balance,
}

/// Computes the fee on exit and commits the outcome atomically:
/// wallet debit, `FEE` ledger entry and session closure together, or
/// a deferred-payment closure with no wallet mutation at all.
///
/// Callers must hold the vehicle lock and then the owner lock for the
/// whole call, in that order.
pub struct SettlementEngine {
    sessions: SessionStoreBox,
    wallets: WalletStoreBox,
    settlements: SettlementStoreBox,
    audit: AuditLogBox,
    fees: FeeSchedule,
}

impl SettlementEngine {
    pub fn new(
        sessions: SessionStoreBox,
        wallets: WalletStoreBox,
        settlements: SettlementStoreBox,
        audit: AuditLogBox,
        fees: FeeSchedule,
    ) -> Self {
        Self {
            sessions,
            wallets,
            settlements,
            audit,
            fees,
        }
    }

    pub async fn settle_exit(&self, vehicle: &Vehicle, lot_id: Option<LotId>) -> Result<Settlement> {
        let Some(mut session) = self.sessions.find_open(vehicle.id).await? else {
            return Err(ParkingError::NoOpenSession);
        };

        // The lot recorded at entry wins; the exit camera's lot is only
        // a fallback for sessions opened without one.
        let fee = self.fees.fee_for(session.lot_id.or(lot_id));
        let wallet = self.wallets.get_or_create(vehicle.owner).await?;
        let now = Utc::now();

        if !wallet.balance.covers(fee) {
            // Deferred payment: the vehicle exits, the fee stays on the
            // session as debt. No wallet mutation, no ledger entry.
            session.close(now, fee, PaymentStatus::Unpaid)?;
            self.commit_with_retry(&session, None).await?;
            self.record_audit(AuditEvent::vehicle_exited(&vehicle.plate, fee, false))
                .await;
            tracing::warn!(
                plate = %vehicle.plate,
                balance = %wallet.balance,
                required = %fee,
                "checkout with insufficient funds, fee deferred"
            );
            return Ok(Settlement {
                session,
                fee,
                insufficient_funds: true,
                balance: wallet.balance,
            });
        }

        let mut debited = wallet.clone();
        debited.debit(fee)?;
        session.close(now, fee, PaymentStatus::Paid)?;
        let entry = NewLedgerEntry::fee(vehicle.owner, fee, &vehicle.plate, now);

        self.commit_with_retry(&session, Some((debited.clone(), entry)))
            .await?;
        self.record_audit(AuditEvent::vehicle_exited(&vehicle.plate, fee, true))
            .await;
        tracing::info!(
            plate = %vehicle.plate,
            fee = %fee,
            balance = %debited.balance,
            "vehicle checked out, fee charged"
        );

        Ok(Settlement {
            session,
            fee,
            insufficient_funds: false,
            balance: debited.balance,
        })
    }

    /// Credits the owner's wallet and appends the `TOPUP` ledger entry
    /// as one unit. Commutes with debits under the per-user lock.
    pub async fn top_up(&self, user_id: UserId, amount: Amount) -> Result<Wallet> {
        let mut wallet = self.wallets.get_or_create(user_id).await?;
        wallet.credit(amount);
        let entry = NewLedgerEntry::topup(user_id, amount, Utc::now());
        self.settlements
            .commit_top_up(wallet.clone(), entry)
            .await?;
        tracing::info!(user = %user_id, amount = %amount, "wallet topped up");
        Ok(wallet)
    }

    /// The audit log is append-only and never read back by the core;
    /// once the settlement has committed, a failing audit sink must
    /// not surface as a failed checkout.
    async fn record_audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event).await {
            tracing::warn!(error = %e, "audit append failed after settlement");
        }
    }

    async fn commit_with_retry(
        &self,
        session: &ParkingSession,
        debit: Option<(Wallet, NewLedgerEntry)>,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self
                .settlements
                .commit_settlement(session.clone(), debit.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= MAX_COMMIT_ATTEMPTS {
                        return Err(ParkingError::SettlementFailed {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                    tracing::warn!(attempt, "settlement commit conflict, retrying");
                    tokio::time::sleep(COMMIT_BACKOFF * 2u32.pow(attempt - 1)).await;
                }
                Err(e @ ParkingError::AlreadyClosed(_)) => {
                    // The concurrency contract was violated upstream;
                    // never swallowed.
                    tracing::error!(session = %session.id, "session closed concurrently");
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
