// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{optional, output_flags};
use crate::db::load_document;
use crate::engine::valuation::merge_holdings;
use crate::engine::{PortfolioReport, project, state_as_of};
use crate::models::{Holding, Market};
use crate::utils::{fmt_money, fmt_pct, maybe_print_json, parse_date, pretty_table, today};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("holdings", sub)) => holdings(conn, sub),
        Some(("lots", sub)) => lots(conn, sub),
        Some(("accounts", sub)) => accounts(conn, sub),
        Some(("chart", sub)) => chart(conn, sub),
        Some(("annual", sub)) => annual(conn, sub),
        Some(("allocation", sub)) => allocation(conn, sub),
        Some(("summary", sub)) => summary(conn, sub),
        _ => Ok(()),
    }
}

/// Loads the stored ledger and projects it as of `today`.
pub fn load_report(conn: &Connection, today: NaiveDate) -> Result<PortfolioReport> {
    let doc = load_document(conn)?;
    Ok(project(&doc, today))
}

fn holdings(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let today = today();
    let report = load_report(conn, today)?;
    let rows: Vec<Holding> = if sub.get_flag("merge") {
        merge_holdings(&report.holdings, today)
    } else {
        report.holdings
    };
    if maybe_print_json(json, jsonl, &rows)? {
        return Ok(());
    }
    let ccy = &report.reporting_currency;
    let data = rows
        .iter()
        .map(|h| {
            vec![
                h.account_id.clone().unwrap_or_else(|| "*".into()),
                format!("{}-{}", h.market, h.ticker),
                h.quantity.normalize().to_string(),
                format!("{} {}", h.currency, h.average_cost.round_dp(4)),
                format!("{} {}", h.currency, h.current_price),
                fmt_money(&h.total_cost, ccy),
                fmt_money(&h.current_value, ccy),
                fmt_money(&h.unrealized_pl, ccy),
                fmt_pct(&h.unrealized_pl_percent),
                fmt_pct(&h.weight),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Account", "Security", "Qty", "Avg Cost", "Price", "Cost", "Value", "P&L",
                "P&L %", "Weight"
            ],
            data
        )
    );
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct LotRow {
    pub account_id: String,
    pub market: Market,
    pub ticker: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub total_cost: Decimal,
    pub realized_pl: Decimal,
    pub opened_on: Option<NaiveDate>,
}

/// Open lots after replaying everything dated on or before `as_of`.
pub fn lots_as_of(conn: &Connection, as_of: NaiveDate) -> Result<Vec<LotRow>> {
    let doc = load_document(conn)?;
    let state = state_as_of(&doc, as_of);
    Ok(state
        .open_lots()
        .map(|(key, lot)| LotRow {
            account_id: key.account_id.clone(),
            market: key.market,
            ticker: key.ticker.clone(),
            quantity: lot.quantity,
            average_cost: lot.average_cost(),
            total_cost: lot.total_cost,
            realized_pl: lot.realized_pl,
            opened_on: lot.opened_on,
        })
        .collect())
}

fn lots(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let as_of = match optional(sub, "as-of") {
        Some(raw) => parse_date(raw)?,
        None => today(),
    };
    let rows = lots_as_of(conn, as_of)?;
    if maybe_print_json(json, jsonl, &rows)? {
        return Ok(());
    }
    let data = rows
        .into_iter()
        .map(|l| {
            let ccy = l.market.native_currency();
            vec![
                l.account_id,
                format!("{}-{}", l.market, l.ticker),
                l.quantity.normalize().to_string(),
                fmt_money(&l.average_cost.round_dp(4), ccy),
                fmt_money(&l.total_cost, ccy),
                fmt_money(&l.realized_pl, ccy),
                l.opened_on.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    println!("Lots as of {}", as_of);
    println!(
        "{}",
        pretty_table(
            &["Account", "Security", "Qty", "Avg Cost", "Cost", "Realized", "Opened"],
            data
        )
    );
    Ok(())
}

fn accounts(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let report = load_report(conn, today())?;
    if maybe_print_json(json, jsonl, &report.account_performance)? {
        return Ok(());
    }
    let ccy = &report.reporting_currency;
    let data = report
        .account_performance
        .iter()
        .map(|a| {
            vec![
                a.account_id.clone(),
                fmt_money(&a.cash_native, &a.currency),
                fmt_money(&a.market_value, ccy),
                fmt_money(&a.total_value, ccy),
                fmt_money(&a.unrealized_pl, ccy),
                fmt_money(&a.dividends, ccy),
                fmt_pct(&a.weight),
                format!("{:.2}%", a.annualized_return),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Account", "Cash", "Market Value", "Total", "P&L", "Dividends", "Weight", "XIRR"],
            data
        )
    );
    Ok(())
}

fn real_marker(real: bool) -> String {
    if real { "real".into() } else { "estimated".into() }
}

fn chart(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let report = load_report(conn, today())?;
    if maybe_print_json(json, jsonl, &report.chart)? {
        return Ok(());
    }
    let ccy = &report.reporting_currency;
    let data = report
        .chart
        .iter()
        .map(|p| {
            vec![
                p.year.to_string(),
                fmt_money(&p.cumulative_cost, ccy),
                fmt_money(&p.total_assets, ccy),
                fmt_money(&p.cumulative_profit, ccy),
                fmt_pct(&p.cost_ratio),
                real_marker(p.is_real_data),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Year", "Cost", "Assets", "Profit", "Cost Ratio", "Data"], data)
    );
    Ok(())
}

fn annual(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let report = load_report(conn, today())?;
    if maybe_print_json(json, jsonl, &report.annual_performance)? {
        return Ok(());
    }
    let ccy = &report.reporting_currency;
    let data = report
        .annual_performance
        .iter()
        .map(|a| {
            vec![
                a.year.to_string(),
                fmt_money(&a.start_assets, ccy),
                fmt_money(&a.net_inflow, ccy),
                fmt_money(&a.end_assets, ccy),
                fmt_money(&a.profit, ccy),
                fmt_pct(&a.roi),
                real_marker(a.is_real_data),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Year", "Start", "Net Inflow", "End", "Profit", "ROI", "Data"],
            data
        )
    );
    Ok(())
}

fn allocation(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let report = load_report(conn, today())?;
    if maybe_print_json(json, jsonl, &report.allocation)? {
        return Ok(());
    }
    let ccy = &report.reporting_currency;
    let data = report
        .allocation
        .iter()
        .map(|a| vec![a.key.clone(), fmt_money(&a.value, ccy), fmt_pct(&a.percentage)])
        .collect();
    println!("{}", pretty_table(&["Bucket", "Value", "Share"], data));
    Ok(())
}

fn summary(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let report = load_report(conn, today())?;
    if maybe_print_json(json, jsonl, &report)? {
        return Ok(());
    }
    let ccy = &report.reporting_currency;
    let data = vec![
        vec!["As of".into(), report.as_of.to_string()],
        vec!["Market value".into(), fmt_money(&report.total_market_value, ccy)],
        vec!["Cash".into(), fmt_money(&report.total_cash, ccy)],
        vec!["Total value".into(), fmt_money(&report.total_value, ccy)],
        vec!["Cost".into(), fmt_money(&report.total_cost, ccy)],
        vec![
            "Unrealized P&L".into(),
            format!(
                "{} ({})",
                fmt_money(&report.unrealized_pl, ccy),
                fmt_pct(&report.unrealized_pl_percent)
            ),
        ],
        vec!["Realized P&L".into(), fmt_money(&report.realized_pl, ccy)],
        vec!["Dividends".into(), fmt_money(&report.dividends_received, ccy)],
        vec!["Cash weight".into(), fmt_pct(&report.cash_weight)],
        vec![
            "Annualized return".into(),
            format!("{:.2}%", report.annualized_return),
        ],
        vec!["Warnings".into(), report.warnings.len().to_string()],
    ];
    println!("{}", pretty_table(&["Metric", "Value"], data));
    Ok(())
}
