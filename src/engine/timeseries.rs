// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Year-by-year reconstruction of invested cost and total assets.
//!
//! Each past year is valued by replaying events up to Dec 31 and pricing the
//! resulting lots with stored year-end data. Gaps are held forward from the
//! last known price and the point is flagged as estimated. The current year
//! is valued at `today` with live data.

use crate::document::LedgerDocument;
use crate::engine::currency::{CurrencyNormalizer, RateSource};
use crate::engine::flows::{external_flows, net_contributed};
use crate::engine::replay::replay;
use crate::engine::valuation::{MarketData, PricePoint, PriceSource, percent, value_state};
use crate::models::{AnnualPerformanceItem, ChartDataPoint, HistoricalYear, Market, price_key};
use chrono::{Datelike, NaiveDate};
use log::debug;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Year-end prices for one year, holding earlier data forward when missing.
pub struct YearEndPrices<'a> {
    pub year: i32,
    pub historical: &'a BTreeMap<i32, HistoricalYear>,
    pub last_trade_prices: &'a BTreeMap<String, Decimal>,
}

fn stored_price(year: &HistoricalYear, market: Market, ticker: &str) -> Option<Decimal> {
    year.prices
        .get(&price_key(market, ticker))
        .or_else(|| year.prices.get(ticker))
        .copied()
        .filter(|p| *p >= Decimal::ZERO)
}

impl PriceSource for YearEndPrices<'_> {
    fn price(&self, market: Market, ticker: &str) -> PricePoint {
        if let Some(price) = self
            .historical
            .get(&self.year)
            .and_then(|y| stored_price(y, market, ticker))
        {
            return PricePoint {
                price,
                estimated: false,
            };
        }

        let held_forward = self
            .historical
            .range(..self.year)
            .rev()
            .find_map(|(_, y)| stored_price(y, market, ticker))
            .or_else(|| {
                self.last_trade_prices
                    .get(&price_key(market, ticker))
                    .copied()
            });
        PricePoint {
            price: held_forward.unwrap_or(Decimal::ZERO),
            estimated: true,
        }
    }
}

fn year_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

/// One point per calendar year from the first event through `today`'s year.
pub fn build_chart(
    doc: &LedgerDocument,
    market: &MarketData,
    fx: &CurrencyNormalizer<'_>,
    today: NaiveDate,
) -> Vec<ChartDataPoint> {
    let Some(first) = doc
        .transactions
        .iter()
        .map(|t| t.date)
        .chain(doc.cash_flows.iter().map(|f| f.date))
        .filter(|d| *d <= today)
        .min()
    else {
        return Vec::new();
    };

    let members: BTreeSet<&str> = doc.accounts.iter().map(|a| a.id.as_str()).collect();
    let flows = external_flows(&doc.accounts, &doc.cash_flows, &members, fx, Some(today));
    let currencies = doc.account_currencies();

    let mut points = Vec::new();
    for year in first.year()..=today.year() {
        let current_year = year == today.year();
        let boundary = if current_year {
            today
        } else {
            match year_end(year) {
                Some(d) => d,
                None => continue,
            }
        };

        let state = replay(
            &doc.accounts,
            &doc.transactions,
            &doc.cash_flows,
            fx,
            Some(boundary),
        );

        let snapshot = if current_year {
            None
        } else {
            doc.historical_data.get(&year).and_then(|y| y.total_assets)
        };
        let (total_assets, is_real_data) = match snapshot {
            Some(total) => (total, true),
            None if current_year => {
                let valuation =
                    value_state(&state, &currencies, market, fx, RateSource::Current, today);
                (valuation.total_value(), !valuation.estimated)
            }
            None => {
                let prices = YearEndPrices {
                    year,
                    historical: &doc.historical_data,
                    last_trade_prices: &state.last_trade_prices,
                };
                let valuation = value_state(
                    &state,
                    &currencies,
                    &prices,
                    fx,
                    RateSource::Historical(year),
                    boundary,
                );
                (valuation.total_value(), !valuation.estimated)
            }
        };

        let cumulative_cost = net_contributed(&flows, boundary);
        debug!(
            "Chart {}: assets {} cost {} real {}",
            year, total_assets, cumulative_cost, is_real_data
        );
        points.push(ChartDataPoint {
            year,
            date: boundary,
            cumulative_cost,
            cumulative_profit: total_assets - cumulative_cost,
            total_assets,
            is_real_data,
            cost_ratio: percent(cumulative_cost, total_assets),
        });
    }
    points
}

/// Year-over-year performance derived only from consecutive chart points.
pub fn annual_performance(points: &[ChartDataPoint]) -> Vec<AnnualPerformanceItem> {
    let mut previous: Option<&ChartDataPoint> = None;
    let mut items = Vec::with_capacity(points.len());
    for point in points {
        let start_assets = previous.map(|p| p.total_assets).unwrap_or(Decimal::ZERO);
        let previous_cost = previous.map(|p| p.cumulative_cost).unwrap_or(Decimal::ZERO);
        let net_inflow = point.cumulative_cost - previous_cost;
        let end_assets = point.total_assets;
        let profit = end_assets - start_assets - net_inflow;
        items.push(AnnualPerformanceItem {
            year: point.year,
            start_assets,
            net_inflow,
            end_assets,
            profit,
            roi: percent(profit, start_assets + net_inflow),
            is_real_data: point.is_real_data,
        });
        previous = Some(point);
    }
    items
}
