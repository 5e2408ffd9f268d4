//! Expiry-dated stock batches.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LotId;
use crate::money::Money;

/// A received batch of one medication.
///
/// Only `quantity` changes after receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    /// Supplier batch code printed on the packaging.
    pub code: Option<String>,
    pub quantity: u32,
    pub expires_on: Option<NaiveDate>,
    pub purchase_price: Option<Money>,
    pub received_at: DateTime<Utc>,
}

impl Lot {
    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Past or at its expiry date and still holding stock.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        !self.is_empty() && self.expires_on.is_some_and(|d| d <= today)
    }

    /// Expires within `days` after `today`, but not yet expired.
    pub fn is_near_expiry(&self, today: NaiveDate, days: u32) -> bool {
        let horizon = today
            .checked_add_days(chrono::Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        !self.is_empty() && self.expires_on.is_some_and(|d| d > today && d <= horizon)
    }
}

/// Draw order: earliest expiry first, undated lots last.
///
/// Ties keep receipt order when used with a stable sort over lots held in
/// receipt order.
pub(crate) fn fefo_cmp(a: &Lot, b: &Lot) -> Ordering {
    match (a.expires_on, b.expires_on) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Quantity taken from one lot by a dispense or withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: LotId,
    pub quantity: u32,
}

/// New stock arriving at the pharmacy shelf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotIntake {
    pub quantity: u32,
    pub code: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub purchase_price: Option<Money>,
}

impl LotIntake {
    pub fn new(quantity: u32) -> Self {
        Self {
            quantity,
            code: None,
            expires_on: None,
            purchase_price: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn expiring(mut self, date: NaiveDate) -> Self {
        self.expires_on = Some(date);
        self
    }

    pub fn with_purchase_price(mut self, price: Money) -> Self {
        self.purchase_price = Some(price);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(quantity: u32, expires_on: Option<NaiveDate>) -> Lot {
        Lot {
            id: LotId::new(),
            code: None,
            quantity,
            expires_on,
            purchase_price: None,
            received_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiry_is_inclusive_of_today() {
        let today = date(2025, 1, 10);
        assert!(lot(1, Some(today)).is_expired(today));
        assert!(!lot(0, Some(today)).is_expired(today));
        assert!(!lot(1, None).is_expired(today));
    }

    #[test]
    fn near_expiry_window() {
        let today = date(2025, 1, 1);
        assert!(lot(1, Some(date(2025, 1, 31))).is_near_expiry(today, 30));
        assert!(!lot(1, Some(date(2025, 2, 1))).is_near_expiry(today, 30));
        assert!(!lot(1, Some(today)).is_near_expiry(today, 30));
        assert!(!lot(0, Some(date(2025, 1, 5))).is_near_expiry(today, 30));
    }

    #[test]
    fn undated_lots_sort_last() {
        let dated = lot(1, Some(date(2030, 1, 1)));
        let undated = lot(1, None);
        assert_eq!(fefo_cmp(&dated, &undated), Ordering::Less);
        assert_eq!(fefo_cmp(&undated, &dated), Ordering::Greater);
    }
}
