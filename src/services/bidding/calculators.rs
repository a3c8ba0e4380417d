//! Pure bid arithmetic
//!
//! No side effects and no failure modes; every function is total over its
//! inputs. All money amounts are rounded to the cent.

use rust_decimal::Decimal;
use serde::Serialize;

/// Default increment requirement in percent
pub const DEFAULT_MINIMUM_INCREMENT_PERCENT: u32 = 10;

/// Default loser compensation in percent of the winning bid
pub const DEFAULT_COMPENSATION_PERCENT: u32 = 25;

/// Minimum amount the next bid must reach: `current × (1 + pct/100)`.
///
/// Returns zero when there is no current high bid; the absolute platform
/// floor applies separately in validation.
pub fn minimum_next_bid(current_high_bid: Decimal, increment_percent: Decimal) -> Decimal {
    if current_high_bid <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let factor = Decimal::ONE + increment_percent / Decimal::ONE_HUNDRED;
    (current_high_bid * factor).round_dp(2)
}

/// Absolute and relative increment of a bid over its predecessor,
/// recorded on each bid row for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BidIncrement {
    pub amount: Decimal,
    pub percent: Decimal,
}

/// Increment of `new_bid` over `previous_bid`. Percent is zero when there
/// was no previous bid.
pub fn bid_increment(new_bid: Decimal, previous_bid: Decimal) -> BidIncrement {
    let amount = (new_bid - previous_bid).round_dp(2);
    let percent = if previous_bid > Decimal::ZERO {
        (amount / previous_bid * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };
    BidIncrement { amount, percent }
}

/// Consolation payment owed to the losing participant:
/// `winning_bid × pct/100`, zero for non-positive winning bids.
pub fn loser_compensation(winning_bid: Decimal, compensation_percent: Decimal) -> Decimal {
    if winning_bid <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (winning_bid * compensation_percent / Decimal::ONE_HUNDRED).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minimum_next_bid() {
        assert_eq!(minimum_next_bid(dec!(500), dec!(10)), dec!(550.00));
        assert_eq!(minimum_next_bid(dec!(550), dec!(10)), dec!(605.00));
        assert_eq!(minimum_next_bid(dec!(100), dec!(15)), dec!(115.00));
    }

    #[test]
    fn test_minimum_next_bid_rounds_to_cent() {
        // 333.33 * 1.1 = 366.663
        assert_eq!(minimum_next_bid(dec!(333.33), dec!(10)), dec!(366.66));
    }

    #[test]
    fn test_minimum_next_bid_zero_when_no_bids() {
        assert_eq!(minimum_next_bid(dec!(0), dec!(10)), dec!(0));
        assert_eq!(minimum_next_bid(dec!(-5), dec!(10)), dec!(0));
    }

    #[test]
    fn test_bid_increment() {
        let inc = bid_increment(dec!(550), dec!(500));
        assert_eq!(inc.amount, dec!(50.00));
        assert_eq!(inc.percent, dec!(10.00));
    }

    #[test]
    fn test_bid_increment_no_previous() {
        let inc = bid_increment(dec!(500), dec!(0));
        assert_eq!(inc.amount, dec!(500.00));
        assert_eq!(inc.percent, dec!(0));
    }

    #[test]
    fn test_loser_compensation() {
        assert_eq!(loser_compensation(dec!(605), dec!(25)), dec!(151.25));
        assert_eq!(loser_compensation(dec!(1000), dec!(25)), dec!(250.00));
    }

    #[test]
    fn test_loser_compensation_non_positive() {
        assert_eq!(loser_compensation(dec!(0), dec!(25)), dec!(0));
        assert_eq!(loser_compensation(dec!(-100), dec!(25)), dec!(0));
    }

    #[test]
    fn test_compensation_law() {
        // platform revenue is always the exact complement
        for winning in [dec!(605), dec!(550.50), dec!(1234.56)] {
            let comp = loser_compensation(winning, dec!(25));
            let revenue = winning - comp;
            assert_eq!(comp + revenue, winning);
        }
    }
}
