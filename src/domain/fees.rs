use crate::domain::money::Amount;
use crate::domain::vehicle::LotId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Campus-wide default flat fee per completed session, in VND.
pub const DEFAULT_FEE_PER_TURN: Decimal = dec!(2000);

/// Flat per-session fee schedule: a lot-level override where one is
/// configured, otherwise the global default. Not time-based.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    default_fee: Amount,
    overrides: HashMap<LotId, Amount>,
}

impl FeeSchedule {
    pub fn new(default_fee: Amount) -> Self {
        Self {
            default_fee,
            overrides: HashMap::new(),
        }
    }

    pub fn set_lot_fee(&mut self, lot: LotId, fee: Amount) {
        self.overrides.insert(lot, fee);
    }

    pub fn fee_for(&self, lot: Option<LotId>) -> Amount {
        lot.and_then(|l| self.overrides.get(&l).copied())
            .unwrap_or(self.default_fee)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        // DEFAULT_FEE_PER_TURN is positive, so the conversion cannot fail.
        Self::new(Amount::new(DEFAULT_FEE_PER_TURN).unwrap_or_else(|_| unreachable!()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fee_fallback() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.fee_for(None).value(), dec!(2000));
        assert_eq!(schedule.fee_for(Some(LotId(7))).value(), dec!(2000));
    }

    #[test]
    fn test_lot_override() {
        let mut schedule = FeeSchedule::default();
        schedule.set_lot_fee(LotId(2), Amount::new(dec!(3500)).unwrap());

        assert_eq!(schedule.fee_for(Some(LotId(2))).value(), dec!(3500));
        assert_eq!(schedule.fee_for(Some(LotId(1))).value(), dec!(2000));
    }
}
