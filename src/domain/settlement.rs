//! Settlement calculator: who pays what for a matched deal.
//!
//! Pure and deterministic; all figures are derived from the bill amount and
//! the chosen support percentage, never persisted.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::transaction::SupportPercentage;

/// Seeker's cash share of the bill under partial support, in percent.
const SEEKER_SHARE_PCT: u32 = 80;
/// Platform fee under partial support, in percent of the full bill.
const PLATFORM_FEE_PCT: u32 = 5;

/// Derived monetary figures for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Cash the seeker hands to the supporter.
    pub seeker_payment: BigDecimal,
    /// What the seeker keeps compared to paying the bill alone.
    pub seeker_savings: BigDecimal,
    /// What the supporter's QR code must clear at the register.
    pub support_amount: BigDecimal,
    /// Cash back to the supporter after the platform fee.
    pub refund_to_supporter: BigDecimal,
}

fn pct_of(amount: &BigDecimal, percent: u32) -> BigDecimal {
    amount * BigDecimal::from(percent) / BigDecimal::from(100u32)
}

/// Compute the settlement split for `amount` at the given support percentage.
///
/// Full support is a gift: the seeker pays nothing and the supporter is not
/// reimbursed. Partial support has the seeker reimburse 80% in cash while the
/// supporter's card clears the full bill; the refund is that cash minus a 5%
/// platform fee, i.e. 75% of the bill.
pub fn calculate(amount: &BigDecimal, percentage: SupportPercentage) -> Settlement {
    match percentage {
        SupportPercentage::Full => Settlement {
            seeker_payment: BigDecimal::from(0),
            seeker_savings: amount.clone(),
            support_amount: amount.clone(),
            refund_to_supporter: BigDecimal::from(0),
        },
        SupportPercentage::Partial => {
            let seeker_payment = pct_of(amount, SEEKER_SHARE_PCT);
            let platform_fee = pct_of(amount, PLATFORM_FEE_PCT);
            let refund_to_supporter = &seeker_payment - &platform_fee;
            Settlement {
                seeker_savings: amount - &seeker_payment,
                support_amount: amount.clone(),
                refund_to_supporter,
                seeker_payment,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn partial_support_splits_eighty_twenty() {
        let s = calculate(&dec("1000"), SupportPercentage::Partial);
        assert_eq!(s.seeker_payment, dec("800"));
        assert_eq!(s.seeker_savings, dec("200"));
        assert_eq!(s.support_amount, dec("1000"));
        assert_eq!(s.refund_to_supporter, dec("750"));
    }

    #[test]
    fn partial_support_payment_plus_savings_equals_amount() {
        for raw in ["50", "137", "999.99", "2500", "5000"] {
            let amount = dec(raw);
            let s = calculate(&amount, SupportPercentage::Partial);
            assert_eq!(&s.seeker_payment + &s.seeker_savings, amount);
        }
    }

    #[test]
    fn partial_support_refund_is_three_quarters() {
        for raw in ["50", "200", "1234.56", "5000"] {
            let amount = dec(raw);
            let s = calculate(&amount, SupportPercentage::Partial);
            assert_eq!(s.refund_to_supporter, pct_of(&amount, 75));
        }
    }

    #[test]
    fn full_support_is_a_gift() {
        let s = calculate(&dec("500"), SupportPercentage::Full);
        assert_eq!(s.seeker_payment, dec("0"));
        assert_eq!(s.seeker_savings, dec("500"));
        assert_eq!(s.support_amount, dec("500"));
        assert_eq!(s.refund_to_supporter, dec("0"));
    }

    #[test]
    fn calculation_is_pure() {
        let amount = dec("333.33");
        let first = calculate(&amount, SupportPercentage::Partial);
        let second = calculate(&amount, SupportPercentage::Partial);
        assert_eq!(first, second);
        // the input is untouched
        assert_eq!(amount, dec("333.33"));
    }

    #[test]
    fn decimal_amounts_do_not_drift() {
        // repeated recomputation over a non-round decimal stays exact
        let amount = dec("123.45");
        let expected = calculate(&amount, SupportPercentage::Partial);
        for _ in 0..100 {
            assert_eq!(calculate(&amount, SupportPercentage::Partial), expected);
        }
        assert_eq!(expected.seeker_payment, dec("98.76"));
        assert_eq!(expected.refund_to_supporter, dec("92.5875"));
    }
}
