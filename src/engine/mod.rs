// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Pure projection of a ledger document into holdings, balances, history and
//! returns. Nothing in here performs I/O or keeps state between calls.

pub mod cost_basis;
pub mod currency;
pub mod flows;
pub mod replay;
pub mod rollup;
pub mod timeseries;
pub mod valuation;
pub mod xirr;

use crate::document::LedgerDocument;
use crate::models::{
    Account, AccountPerformance, AnnualPerformanceItem, AssetAllocationItem, ChartDataPoint,
    Holding,
};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::BTreeSet;

pub use cost_basis::Lot;
pub use currency::{CurrencyNormalizer, RateSource, RateTable};
pub use replay::{
    LedgerState, LotKey, ReplayWarning, SecurityTransfer, WarningKind, replay,
};
pub use valuation::{MarketData, PriceSource};
pub use xirr::XirrResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub as_of: NaiveDate,
    pub reporting_currency: String,
    pub holdings: Vec<Holding>,
    pub accounts: Vec<Account>,
    pub total_market_value: Decimal,
    pub total_cash: Decimal,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub unrealized_pl: Decimal,
    pub unrealized_pl_percent: Decimal,
    pub realized_pl: Decimal,
    pub dividends_received: Decimal,
    pub cash_weight: Decimal,
    /// Money-weighted annualized return of the whole portfolio, in percent.
    pub annualized_return: f64,
    pub xirr: XirrResult,
    pub chart: Vec<ChartDataPoint>,
    pub annual_performance: Vec<AnnualPerformanceItem>,
    pub account_performance: Vec<AccountPerformance>,
    pub allocation: Vec<AssetAllocationItem>,
    pub warnings: Vec<ReplayWarning>,
}

/// Lot and cash state after every event dated on or before `cutoff`.
pub fn state_as_of(doc: &LedgerDocument, cutoff: NaiveDate) -> LedgerState {
    let fx = doc.normalizer();
    replay(
        &doc.accounts,
        &doc.transactions,
        &doc.cash_flows,
        &fx,
        Some(cutoff),
    )
}

/// Projects the whole document into the reporting view as of `today`.
pub fn project(doc: &LedgerDocument, today: NaiveDate) -> PortfolioReport {
    let fx = doc.normalizer();
    let market = doc.market_data();
    let currencies = doc.account_currencies();

    let state = replay(
        &doc.accounts,
        &doc.transactions,
        &doc.cash_flows,
        &fx,
        Some(today),
    );
    let mut live = valuation::value_state(
        &state,
        &currencies,
        &market,
        &fx,
        RateSource::Current,
        today,
    );

    let total_market_value = live.market_value();
    let total_cash = live.cash_total();
    let total_value = total_market_value + total_cash;
    valuation::apply_weights(&mut live.holdings, total_value);

    let total_cost = live.total_cost();
    let unrealized_pl = total_market_value - total_cost;
    let dividends_received = state
        .dividends
        .iter()
        .filter_map(|(id, amount)| {
            currencies
                .get(id)
                .map(|ccy| fx.convert(*amount, ccy, RateSource::Current))
        })
        .sum();

    let members: BTreeSet<&str> = doc.accounts.iter().map(|a| a.id.as_str()).collect();
    let external = flows::external_flows(
        &doc.accounts,
        &doc.cash_flows,
        &members,
        &fx,
        Some(today),
    );
    let portfolio_xirr = xirr::xirr(
        &xirr::investor_flows(&external),
        total_value.to_f64().unwrap_or(0.0),
        today,
    );

    let chart = timeseries::build_chart(doc, &market, &fx, today);
    let annual_performance = timeseries::annual_performance(&chart);
    let account_performance = rollup::account_performance(
        &doc.accounts,
        &doc.cash_flows,
        &state,
        &live,
        &fx,
        today,
        total_value,
    );
    let allocation = rollup::asset_allocation(&live.holdings, total_cash, total_value);

    debug!(
        "Projected {} holdings, total value {} {}",
        live.holdings.len(),
        total_value,
        doc.reporting_currency
    );

    PortfolioReport {
        as_of: today,
        reporting_currency: doc.reporting_currency.clone(),
        accounts: state.accounts_with_balances(&doc.accounts),
        total_market_value,
        total_cash,
        total_value,
        total_cost,
        unrealized_pl,
        unrealized_pl_percent: valuation::percent(unrealized_pl, total_cost),
        realized_pl: live.realized_pl,
        dividends_received,
        cash_weight: valuation::percent(total_cash, total_value),
        annualized_return: portfolio_xirr.rate_percent,
        xirr: portfolio_xirr,
        chart,
        annual_performance,
        account_performance,
        allocation,
        warnings: state.warnings,
        holdings: live.holdings,
    }
}
