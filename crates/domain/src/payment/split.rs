//! Revenue split between the clinic and the attending professional.

use serde::{Deserialize, Serialize};

use crate::money::{Money, Percentage};

/// 57.14%: a 35.00 visit leaves 20.00 to the clinic.
pub const DEFAULT_COMPANY_SHARE: Percentage = Percentage::from_basis_points_const(5_714);

/// Shares and the amounts they yield on a payment total.
///
/// Each amount is rounded to the cent on its own, so the two may differ
/// from the total by one cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub company_share: Percentage,
    pub professional_share: Percentage,
    pub company_amount: Money,
    pub professional_amount: Money,
}

impl RevenueSplit {
    /// Splits `total`, the professional taking the rest of `company_share`.
    pub fn calculate(total: Money, company_share: Percentage) -> Self {
        let professional_share = company_share.complement();
        Self {
            company_share,
            professional_share,
            company_amount: company_share.of(total),
            professional_amount: professional_share.of(total),
        }
    }

    pub fn with_default_shares(total: Money) -> Self {
        Self::calculate(total, DEFAULT_COMPANY_SHARE)
    }

    /// `total` minus both amounts; at most one cent either way.
    pub fn residual(&self, total: Money) -> Money {
        total - self.company_amount - self.professional_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_split_of_35() {
        let split = RevenueSplit::with_default_shares(Money::from_major(35));
        assert_eq!(split.company_amount, Money::from_major(20));
        assert_eq!(split.professional_amount, Money::from_major(15));
        assert_eq!(split.professional_share.basis_points(), 4_286);
    }

    #[test]
    fn residual_stays_within_a_cent() {
        for cents in [1, 7, 99, 1_001, 3_333, 12_345, 99_999, 1_000_001] {
            let total = Money::from_cents(cents);
            let split = RevenueSplit::with_default_shares(total);
            assert!(split.residual(total).cents().abs() <= 1, "total {total}");
        }
    }

    #[test]
    fn custom_share() {
        let share = Percentage::from_basis_points(7_000).unwrap();
        let split = RevenueSplit::calculate(Money::from_major(100), share);
        assert_eq!(split.company_amount, Money::from_major(70));
        assert_eq!(split.professional_amount, Money::from_major(30));
    }
}
