//! Order pricing rules.
//!
//! * `subtotal` is the sum of `unit_price * quantity` over all line items.
//! * `tax` is 18% of the subtotal, rounded half-up to a whole currency unit.
//! * `shipping` is free when the subtotal exceeds 1000.00, otherwise a flat 100.00.
//! * `total = subtotal + tax + shipping`.
use serde::{Deserialize, Serialize};

use crate::db_types::{Money, NewLineItem};

pub const TAX_RATE_PERCENT: i64 = 18;
/// Subtotals strictly greater than this ship for free
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_major(1000);
pub const FLAT_SHIPPING_FEE: Money = Money::from_major(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    pub fn from_subtotal(subtotal: Money) -> Self {
        let tax = subtotal.fraction_rounded_to_major(TAX_RATE_PERCENT, 100);
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD { Money::default() } else { FLAT_SHIPPING_FEE };
        let total = subtotal + tax + shipping;
        Self { subtotal, tax, shipping, total }
    }

    pub fn for_items(items: &[NewLineItem]) -> Self {
        let subtotal = items.iter().map(|i| i.line_total()).sum();
        Self::from_subtotal(subtotal)
    }
}
