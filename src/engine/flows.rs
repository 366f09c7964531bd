// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::{CurrencyNormalizer, RateSource};
use crate::engine::replay::{SecurityTransfer, flow_problem};
use crate::models::{Account, CashFlow, CashFlowKind};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Money crossing the boundary of an account set, in the reporting currency.
/// Positive amounts flow into the set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalFlow {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Reporting-currency value of a cash flow's gross amount.
///
/// Order of preference: the recorded reporting amount, the flow's own rate,
/// then the year-end rate for the flow's year.
pub fn reporting_amount(flow: &CashFlow, currency: &str, fx: &CurrencyNormalizer<'_>) -> Decimal {
    if let Some(exact) = flow.amount_reporting {
        return exact;
    }
    if fx.is_reporting(currency) {
        return flow.amount;
    }
    match flow.exchange_rate {
        Some(rate) if flow.kind != CashFlowKind::Transfer => flow.amount * rate,
        _ => fx.convert(flow.amount, currency, RateSource::Historical(flow.date.year())),
    }
}

/// Deposits, withdrawals and boundary-crossing transfers for `members`,
/// dated on or before `cutoff`. Interest and internal transfers are returns
/// earned inside the set, not contributions, so they are left out. Flows that
/// replay rejects as invalid are left out too.
pub fn external_flows(
    accounts: &[Account],
    cash_flows: &[CashFlow],
    members: &BTreeSet<&str>,
    fx: &CurrencyNormalizer<'_>,
    cutoff: Option<NaiveDate>,
) -> Vec<ExternalFlow> {
    let currencies: HashMap<&str, &str> = accounts
        .iter()
        .map(|a| (a.id.as_str(), a.currency.as_str()))
        .collect();

    let mut flows: Vec<ExternalFlow> = Vec::new();
    for flow in cash_flows {
        if cutoff.is_some_and(|c| flow.date > c) {
            continue;
        }
        let Some(currency) = currencies.get(flow.account_id.as_str()) else {
            continue;
        };
        let inside = members.contains(flow.account_id.as_str());
        let sign = match flow.kind {
            CashFlowKind::Deposit if inside => Decimal::ONE,
            CashFlowKind::Withdraw if inside => Decimal::NEGATIVE_ONE,
            CashFlowKind::Transfer => {
                let Some(target) = flow.target_account_id.as_deref() else {
                    continue;
                };
                if !currencies.contains_key(target) {
                    continue;
                }
                match (inside, members.contains(target)) {
                    (true, false) => Decimal::NEGATIVE_ONE,
                    (false, true) => Decimal::ONE,
                    _ => continue,
                }
            }
            _ => continue,
        };
        if flow_problem(flow).is_some() {
            continue;
        }
        flows.push(ExternalFlow {
            date: flow.date,
            amount: sign * reporting_amount(flow, currency, fx),
        });
    }
    flows.sort_by_key(|f| f.date);
    flows
}

/// Paired security transfers crossing the boundary of `members`, valued at
/// the cost they carried and converted at the year-end rate of their year.
pub fn security_transfer_flows(
    transfers: &[SecurityTransfer],
    members: &BTreeSet<&str>,
    fx: &CurrencyNormalizer<'_>,
    cutoff: Option<NaiveDate>,
) -> Vec<ExternalFlow> {
    transfers
        .iter()
        .filter(|t| cutoff.is_none_or(|c| t.date <= c))
        .filter_map(|t| {
            let sign = match (
                members.contains(t.from_account.as_str()),
                members.contains(t.to_account.as_str()),
            ) {
                (true, false) => Decimal::NEGATIVE_ONE,
                (false, true) => Decimal::ONE,
                _ => return None,
            };
            let cost = fx.convert(
                t.cost,
                t.market.native_currency(),
                RateSource::Historical(t.date.year()),
            );
            Some(ExternalFlow {
                date: t.date,
                amount: sign * cost,
            })
        })
        .collect()
}

/// Net contributions (into minus out of the set) up to and including `date`.
pub fn net_contributed(flows: &[ExternalFlow], date: NaiveDate) -> Decimal {
    flows
        .iter()
        .take_while(|f| f.date <= date)
        .map(|f| f.amount)
        .sum()
}
