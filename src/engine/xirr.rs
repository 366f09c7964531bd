// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Money-weighted annualized return over irregularly dated cash flows.
//!
//! Solves `Σ CF_i / (1 + r)^t_i = 0`, `t_i` in years (days / 365) since the
//! first flow, with Newton-Raphson from `r = 0.10` and a bisection fallback
//! on `[-0.99, 10.0]`. Investor outflows (deposits) are negative; the
//! terminal portfolio value is a positive inflow.

use crate::engine::flows::ExternalFlow;
use chrono::NaiveDate;
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

const INITIAL_GUESS: f64 = 0.10;
const TOLERANCE: f64 = 1e-7;
const MAX_ITERATIONS: usize = 100;
const MAX_BISECTIONS: usize = 200;
const BRACKET: (f64, f64) = (-0.99, 10.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedFlow {
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveMethod {
    /// Nothing to solve; the result is the 0 sentinel.
    Skipped,
    NewtonRaphson,
    Bisection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct XirrResult {
    /// Annualized rate in percent. Always finite.
    pub rate_percent: f64,
    pub converged: bool,
    pub iterations: usize,
    pub method: SolveMethod,
}

impl XirrResult {
    fn sentinel(method: SolveMethod, iterations: usize) -> Self {
        XirrResult {
            rate_percent: 0.0,
            converged: false,
            iterations,
            method,
        }
    }

    fn solved(rate: f64, method: SolveMethod, iterations: usize) -> Self {
        if !rate.is_finite() {
            return Self::sentinel(method, iterations);
        }
        XirrResult {
            rate_percent: rate * 100.0,
            converged: true,
            iterations,
            method,
        }
    }
}

/// Investor-signed flows from contributions into an account set.
pub fn investor_flows(flows: &[ExternalFlow]) -> Vec<DatedFlow> {
    flows
        .iter()
        .filter_map(|f| {
            f.amount.to_f64().map(|amount| DatedFlow {
                date: f.date,
                amount: -amount,
            })
        })
        .collect()
}

fn npv_and_derivative(series: &[(f64, f64)], rate: f64) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;
    for (cf, years) in series {
        let discount = (1.0 + rate).powf(*years);
        npv += cf / discount;
        dnpv -= years * cf / (discount * (1.0 + rate));
    }
    (npv, dnpv)
}

/// Annualized money-weighted return of `flows` plus `terminal_value` at
/// `terminal_date`. Returns 0 when there is nothing invested or no root.
pub fn xirr(flows: &[DatedFlow], terminal_value: f64, terminal_date: NaiveDate) -> XirrResult {
    let flows: Vec<&DatedFlow> = flows
        .iter()
        .filter(|f| f.amount.is_finite() && f.amount != 0.0)
        .collect();
    let invested: f64 = flows.iter().filter(|f| f.amount < 0.0).map(|f| -f.amount).sum();
    if flows.is_empty() || invested == 0.0 {
        return XirrResult::sentinel(SolveMethod::Skipped, 0);
    }

    let first = flows
        .iter()
        .map(|f| f.date)
        .chain(std::iter::once(terminal_date))
        .min()
        .unwrap_or(terminal_date);
    let years = |date: NaiveDate| (date - first).num_days() as f64 / 365.0;

    let mut series: Vec<(f64, f64)> = flows.iter().map(|f| (f.amount, years(f.date))).collect();
    if terminal_value.is_finite() && terminal_value != 0.0 {
        series.push((terminal_value, years(terminal_date)));
    }

    let mut rate = INITIAL_GUESS;
    for iteration in 0..MAX_ITERATIONS {
        let (npv, dnpv) = npv_and_derivative(&series, rate);
        if !npv.is_finite() {
            break;
        }
        if npv.abs() < TOLERANCE {
            return XirrResult::solved(rate, SolveMethod::NewtonRaphson, iteration);
        }
        if !dnpv.is_finite() || dnpv.abs() < 1e-12 {
            break;
        }
        let next = rate - npv / dnpv;
        if !next.is_finite() || next <= -1.0 {
            break;
        }
        rate = next;
    }

    debug!("Newton-Raphson did not converge from {}; bisecting", INITIAL_GUESS);
    bisect(&series)
}

fn bisect(series: &[(f64, f64)]) -> XirrResult {
    let (mut lo, mut hi) = BRACKET;
    let mut f_lo = npv_and_derivative(series, lo).0;
    let f_hi = npv_and_derivative(series, hi).0;
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo.signum() == f_hi.signum() {
        return XirrResult::sentinel(SolveMethod::Bisection, 0);
    }

    for iteration in 0..MAX_BISECTIONS {
        let mid = (lo + hi) / 2.0;
        let f_mid = npv_and_derivative(series, mid).0;
        if f_mid.abs() < TOLERANCE || (hi - lo) / 2.0 < 1e-12 {
            return XirrResult::solved(mid, SolveMethod::Bisection, iteration);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    XirrResult::sentinel(SolveMethod::Bisection, MAX_BISECTIONS)
}
