// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::{CurrencyNormalizer, RateSource};
use crate::engine::flows::{external_flows, security_transfer_flows};
use crate::engine::replay::LedgerState;
use crate::engine::valuation::{Valuation, percent};
use crate::engine::xirr::{investor_flows, xirr};
use crate::models::{
    Account, AccountPerformance, AssetAllocationItem, CASH_BUCKET, CashFlow, Holding, Market,
    price_key,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::{BTreeMap, BTreeSet};

/// One row per account; percentages are against `total_value`. Cash and
/// security transfers with other accounts count toward the account's XIRR.
pub fn account_performance(
    accounts: &[Account],
    cash_flows: &[CashFlow],
    state: &LedgerState,
    valuation: &Valuation,
    fx: &CurrencyNormalizer<'_>,
    today: NaiveDate,
    total_value: Decimal,
) -> Vec<AccountPerformance> {
    accounts
        .iter()
        .map(|account| {
            let held: Vec<&Holding> = valuation
                .holdings
                .iter()
                .filter(|h| h.account_id.as_deref() == Some(account.id.as_str()))
                .collect();
            let market_value: Decimal = held.iter().map(|h| h.current_value).sum();
            let total_cost: Decimal = held.iter().map(|h| h.total_cost).sum();
            let cash = valuation.cash.get(&account.id).copied().unwrap_or(Decimal::ZERO);
            let account_total = market_value + cash;
            let unrealized_pl = market_value - total_cost;
            let dividends = fx.convert(
                state.dividends.get(&account.id).copied().unwrap_or(Decimal::ZERO),
                &account.currency,
                RateSource::Current,
            );

            let members = BTreeSet::from([account.id.as_str()]);
            let mut flows = external_flows(accounts, cash_flows, &members, fx, Some(today));
            flows.extend(security_transfer_flows(
                &state.security_transfers,
                &members,
                fx,
                Some(today),
            ));
            flows.sort_by_key(|f| f.date);
            let annualized_return = xirr(
                &investor_flows(&flows),
                account_total.to_f64().unwrap_or(0.0),
                today,
            )
            .rate_percent;

            AccountPerformance {
                account_id: account.id.clone(),
                name: account.name.clone(),
                currency: account.currency.clone(),
                cash_native: state.cash_of(&account.id),
                cash,
                market_value,
                total_value: account_total,
                total_cost,
                unrealized_pl,
                unrealized_pl_percent: percent(unrealized_pl, total_cost),
                dividends,
                weight: percent(account_total, total_value),
                annualized_return,
            }
        })
        .collect()
}

/// One bucket per (market, ticker) plus a single cash bucket, largest first.
pub fn asset_allocation(
    holdings: &[Holding],
    cash_total: Decimal,
    total_value: Decimal,
) -> Vec<AssetAllocationItem> {
    let mut buckets: BTreeMap<(Market, String), Decimal> = BTreeMap::new();
    for h in holdings {
        *buckets
            .entry((h.market, h.ticker.clone()))
            .or_insert(Decimal::ZERO) += h.current_value;
    }

    let mut items: Vec<AssetAllocationItem> = buckets
        .into_iter()
        .map(|((market, ticker), value)| AssetAllocationItem {
            key: price_key(market, &ticker),
            market: Some(market),
            value,
            percentage: percent(value, total_value),
        })
        .collect();
    items.push(AssetAllocationItem {
        key: CASH_BUCKET.to_string(),
        market: None,
        value: cash_total,
        percentage: percent(cash_total, total_value),
    });
    items.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.key.cmp(&b.key)));
    items
}
