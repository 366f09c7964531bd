// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Weighted-average cost basis for a single (account, market, ticker) lot.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Running quantity and cost in the security's native currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Lot {
    pub quantity: Decimal,
    pub total_cost: Decimal,
    /// Survives liquidation; only the open position resets.
    pub realized_pl: Decimal,
    pub opened_on: Option<NaiveDate>,
}

/// What a disposal actually removed from the lot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disposal {
    pub quantity: Decimal,
    pub cost: Decimal,
    /// Requested quantity that the lot did not hold.
    pub shortfall: Decimal,
}

impl Disposal {
    pub fn is_clamped(&self) -> bool {
        self.shortfall > Decimal::ZERO
    }
}

impl Lot {
    pub fn average_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.total_cost / self.quantity
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    pub fn acquire(&mut self, quantity: Decimal, cost: Decimal, date: NaiveDate) {
        if quantity <= Decimal::ZERO {
            return;
        }
        if !self.is_open() {
            self.quantity = Decimal::ZERO;
            self.total_cost = Decimal::ZERO;
            self.opened_on = Some(date);
        }
        self.quantity += quantity;
        self.total_cost += cost.max(Decimal::ZERO);
    }

    /// Removes up to `quantity` units at the current average cost.
    pub fn dispose(&mut self, quantity: Decimal) -> Disposal {
        let requested = quantity.max(Decimal::ZERO);
        let removed = requested.min(self.quantity);
        let cost = if removed == self.quantity {
            self.total_cost
        } else {
            (self.average_cost() * removed).min(self.total_cost)
        };

        self.quantity -= removed;
        self.total_cost -= cost;
        if self.quantity.is_zero() {
            self.total_cost = Decimal::ZERO;
            self.opened_on = None;
        }

        Disposal {
            quantity: removed,
            cost,
            shortfall: requested - removed,
        }
    }

    /// Disposes for a sale and books realized P&L on the units actually held.
    pub fn sell(&mut self, quantity: Decimal, proceeds: Decimal) -> Disposal {
        let disposal = self.dispose(quantity);
        let matched_proceeds = if disposal.is_clamped() && !quantity.is_zero() {
            proceeds * disposal.quantity / quantity
        } else {
            proceeds
        };
        self.realized_pl += matched_proceeds - disposal.cost;
        disposal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[test]
    fn partial_sell_keeps_average_cost() {
        let mut lot = Lot::default();
        lot.acquire(d("100"), d("1000"), day(1));
        let disposal = lot.sell(d("40"), d("480"));

        assert_eq!(disposal.cost, d("400"));
        assert_eq!(lot.quantity, d("60"));
        assert_eq!(lot.total_cost, d("600"));
        assert_eq!(lot.average_cost(), d("10"));
        assert_eq!(lot.realized_pl, d("80"));
    }

    #[test]
    fn full_liquidation_resets_basis() {
        let mut lot = Lot::default();
        lot.acquire(d("3"), d("100"), day(1));
        lot.sell(d("3"), d("90"));
        assert_eq!(lot.total_cost, Decimal::ZERO);
        assert_eq!(lot.opened_on, None);

        lot.acquire(d("10"), d("50"), day(5));
        assert_eq!(lot.average_cost(), d("5"));
        assert_eq!(lot.opened_on, Some(day(5)));
        assert_eq!(lot.realized_pl, d("-10"));
    }

    #[test]
    fn oversell_clamps_to_zero() {
        let mut lot = Lot::default();
        lot.acquire(d("10"), d("100"), day(1));
        let disposal = lot.sell(d("15"), d("150"));

        assert!(disposal.is_clamped());
        assert_eq!(disposal.shortfall, d("5"));
        assert_eq!(lot.quantity, Decimal::ZERO);
        assert_eq!(lot.total_cost, Decimal::ZERO);
        assert_eq!(lot.realized_pl, Decimal::ZERO);
    }

    #[test]
    fn average_cost_of_empty_lot_is_zero() {
        assert_eq!(Lot::default().average_cost(), Decimal::ZERO);
    }
}
