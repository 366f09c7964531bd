// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::{CurrencyNormalizer, RateSource};
use crate::engine::replay::LedgerState;
use crate::models::{Holding, Market, PriceDetail, price_key};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub price: Decimal,
    pub estimated: bool,
}

/// Where valuation gets a native-currency price for a security.
pub trait PriceSource {
    fn price(&self, market: Market, ticker: &str) -> PricePoint;

    fn detail(&self, _market: Market, _ticker: &str) -> Option<&PriceDetail> {
        None
    }
}

/// Live prices and quote details keyed by `MARKET-TICKER`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    pub prices: BTreeMap<String, Decimal>,
    pub details: BTreeMap<String, PriceDetail>,
}

impl PriceSource for MarketData {
    /// A missing quote is priced at 0 on purpose: the holding shows a full
    /// unrealized loss instead of disappearing.
    fn price(&self, market: Market, ticker: &str) -> PricePoint {
        match self.prices.get(&price_key(market, ticker)) {
            Some(price) if *price >= Decimal::ZERO => PricePoint {
                price: *price,
                estimated: false,
            },
            _ => {
                debug!("No live price for {}; valuing at 0", price_key(market, ticker));
                PricePoint {
                    price: Decimal::ZERO,
                    estimated: true,
                }
            }
        }
    }

    fn detail(&self, market: Market, ticker: &str) -> Option<&PriceDetail> {
        self.details.get(&price_key(market, ticker))
    }
}

/// Holdings plus cash for one valuation pass, in the reporting currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    pub holdings: Vec<Holding>,
    pub cash: BTreeMap<String, Decimal>,
    pub realized_pl: Decimal,
    /// Any price or rate came from a fallback.
    pub estimated: bool,
}

impl Valuation {
    pub fn market_value(&self) -> Decimal {
        self.holdings.iter().map(|h| h.current_value).sum()
    }

    pub fn cash_total(&self) -> Decimal {
        self.cash.values().copied().sum()
    }

    pub fn total_value(&self) -> Decimal {
        self.market_value() + self.cash_total()
    }

    pub fn total_cost(&self) -> Decimal {
        self.holdings.iter().map(|h| h.total_cost).sum()
    }
}

/// `part / whole × 100`, or 0 when `whole` is not positive.
pub fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}

/// Price-only annualized return in percent. Holdings younger than a year
/// report the simple return.
pub fn cagr(
    cost: Decimal,
    value: Decimal,
    opened_on: Option<NaiveDate>,
    today: NaiveDate,
) -> Decimal {
    if cost <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let days = opened_on.map(|d| (today - d).num_days()).unwrap_or(0);
    if days < 365 {
        return percent(value - cost, cost);
    }
    let (Some(v), Some(c)) = (value.to_f64(), cost.to_f64()) else {
        return Decimal::ZERO;
    };
    let annual = ((v / c).powf(365.0 / days as f64) - 1.0) * 100.0;
    if !annual.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(annual)
        .map(|a| a.round_dp(4))
        .unwrap_or(Decimal::ZERO)
}

/// Values every open lot and every account's cash. Weights stay 0 until
/// [`apply_weights`] runs with the final portfolio total.
pub fn value_state(
    state: &LedgerState,
    currencies: &BTreeMap<String, String>,
    prices: &dyn PriceSource,
    fx: &CurrencyNormalizer<'_>,
    source: RateSource,
    today: NaiveDate,
) -> Valuation {
    let mut estimated = false;
    let mut holdings = Vec::new();

    for (key, lot) in state.open_lots() {
        let currency = key.market.native_currency();
        let quote = prices.price(key.market, &key.ticker);
        let rate = fx.rate(currency, source);
        estimated |= quote.estimated || rate.estimated;

        let current_value = lot.quantity * quote.price * rate.value;
        let total_cost = lot.total_cost * rate.value;
        let unrealized_pl = current_value - total_cost;
        let (day_change, day_change_percent) = prices
            .detail(key.market, &key.ticker)
            .map(|detail| {
                (
                    lot.quantity * detail.change * rate.value,
                    detail.change_percent,
                )
            })
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        holdings.push(Holding {
            account_id: Some(key.account_id.clone()),
            market: key.market,
            ticker: key.ticker.clone(),
            currency: currency.to_string(),
            quantity: lot.quantity,
            average_cost: lot.average_cost(),
            current_price: quote.price,
            total_cost,
            current_value,
            unrealized_pl,
            unrealized_pl_percent: percent(unrealized_pl, total_cost),
            realized_pl: lot.realized_pl * rate.value,
            day_change,
            day_change_percent,
            weight: Decimal::ZERO,
            annualized_return: cagr(total_cost, current_value, lot.opened_on, today),
            opened_on: lot.opened_on,
        });
    }

    let realized_pl = state
        .lots
        .iter()
        .map(|(key, lot)| fx.convert(lot.realized_pl, key.market.native_currency(), source))
        .sum();

    let mut cash = BTreeMap::new();
    for (account_id, balance) in &state.cash {
        let Some(currency) = currencies.get(account_id) else {
            continue;
        };
        let (converted, flagged) = fx.convert_flagged(*balance, currency, source);
        estimated |= flagged;
        cash.insert(account_id.clone(), converted);
    }

    Valuation {
        holdings,
        cash,
        realized_pl,
        estimated,
    }
}

/// Second valuation pass: weights against the full portfolio value.
pub fn apply_weights(holdings: &mut [Holding], total_portfolio_value: Decimal) {
    for holding in holdings.iter_mut() {
        holding.weight = percent(holding.current_value, total_portfolio_value);
    }
}

/// Aggregates holdings across accounts by (market, ticker).
pub fn merge_holdings(holdings: &[Holding], today: NaiveDate) -> Vec<Holding> {
    let mut merged: BTreeMap<(Market, String), Holding> = BTreeMap::new();
    let mut native_cost: BTreeMap<(Market, String), Decimal> = BTreeMap::new();

    for h in holdings {
        let key = (h.market, h.ticker.clone());
        *native_cost.entry(key.clone()).or_insert(Decimal::ZERO) += h.average_cost * h.quantity;
        merged
            .entry(key)
            .and_modify(|m| {
                m.quantity += h.quantity;
                m.total_cost += h.total_cost;
                m.current_value += h.current_value;
                m.realized_pl += h.realized_pl;
                m.day_change += h.day_change;
                m.weight += h.weight;
                m.opened_on = match (m.opened_on, h.opened_on) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            })
            .or_insert_with(|| Holding {
                account_id: None,
                ..h.clone()
            });
    }

    merged
        .into_iter()
        .map(|(key, mut m)| {
            let cost_native = native_cost.get(&key).copied().unwrap_or(Decimal::ZERO);
            m.average_cost = if m.quantity.is_zero() {
                Decimal::ZERO
            } else {
                cost_native / m.quantity
            };
            m.unrealized_pl = m.current_value - m.total_cost;
            m.unrealized_pl_percent = percent(m.unrealized_pl, m.total_cost);
            m.annualized_return = cagr(m.total_cost, m.current_value, m.opened_on, today);
            m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn percent_guards_non_positive_denominator() {
        assert_eq!(percent(d("5"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent(d("5"), d("-1")), Decimal::ZERO);
        assert_eq!(percent(d("5"), d("50")), d("10"));
    }

    #[test]
    fn cagr_is_simple_return_under_one_year() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let opened = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(cagr(d("100"), d("110"), opened, today), d("10"));
    }

    #[test]
    fn cagr_annualizes_over_two_years() {
        let opened = NaiveDate::from_ymd_opt(2022, 1, 1);
        let today = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(); // 729 days
        let r = cagr(d("100"), d("121"), opened, today).to_f64().unwrap();
        assert!((r - 10.0).abs() < 0.05, "got {}", r);
    }

    #[test]
    fn missing_live_price_defaults_to_zero() {
        let data = MarketData::default();
        let point = data.price(Market::Us, "AAPL");
        assert_eq!(point.price, Decimal::ZERO);
        assert!(point.estimated);
    }
}
