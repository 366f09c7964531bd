// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{optional, output_flags, required};
use crate::db::{insert_cash_flow, load_cash_flows};
use crate::models::{CashFlow, CashFlowKind};
use crate::utils::{maybe_print_json, parse_date, parse_decimal, pretty_table};
use anyhow::{Result, bail};
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub),
        Some(("list", sub)) => list(conn, sub),
        _ => Ok(()),
    }
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let flow = CashFlow {
        id: 0,
        date: parse_date(required(sub, "date")?)?,
        kind: required(sub, "kind")?.parse()?,
        amount: parse_decimal(required(sub, "amount")?)?,
        amount_reporting: optional(sub, "reporting-amount")
            .map(parse_decimal)
            .transpose()?,
        fee: optional(sub, "fee").map(parse_decimal).transpose()?,
        account_id: required(sub, "account")?.to_string(),
        target_account_id: optional(sub, "to").map(str::to_string),
        exchange_rate: optional(sub, "rate").map(parse_decimal).transpose()?,
        category: optional(sub, "category").map(str::to_string),
    };

    if flow.amount < Decimal::ZERO || flow.fee_or_zero() < Decimal::ZERO {
        bail!("Amount and fee must not be negative");
    }
    if flow.exchange_rate.is_some_and(|r| r <= Decimal::ZERO) {
        bail!("Exchange rate must be positive");
    }
    match (flow.kind, flow.target_account_id.as_deref()) {
        (CashFlowKind::Transfer, None) => bail!("A transfer needs --to"),
        (CashFlowKind::Transfer, Some(to)) if to == flow.account_id => {
            bail!("Cannot transfer into the same account")
        }
        (CashFlowKind::Transfer, Some(_)) => {}
        (_, Some(_)) => bail!("--to only applies to transfers"),
        (_, None) => {}
    }

    let id = insert_cash_flow(conn, &flow)?;
    println!(
        "Recorded {} {} on {} (#{})",
        flow.kind.as_str(),
        flow.amount,
        flow.account_id,
        id
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let flows = load_cash_flows(conn)?;
    if maybe_print_json(json, jsonl, &flows)? {
        return Ok(());
    }
    let data = flows
        .into_iter()
        .map(|f| {
            vec![
                f.id.to_string(),
                f.date.to_string(),
                f.kind.as_str().to_string(),
                f.account_id,
                f.target_account_id.unwrap_or_default(),
                f.amount.to_string(),
                f.fee.map(|v| v.to_string()).unwrap_or_default(),
                f.exchange_rate.map(|v| v.to_string()).unwrap_or_default(),
                f.category.unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Id", "Date", "Kind", "Account", "To", "Amount", "Fee", "Rate", "Category"],
            data
        )
    );
    Ok(())
}
