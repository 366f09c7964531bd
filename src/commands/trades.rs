// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{optional, output_flags, required};
use crate::db::{insert_transaction, load_transactions};
use crate::models::Transaction;
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
    let tx = Transaction {
        id: 0,
        date: parse_date(required(sub, "date")?)?,
        ticker: required(sub, "ticker")?.to_uppercase(),
        market: required(sub, "market")?.parse()?,
        kind: required(sub, "kind")?.parse()?,
        price: parse_decimal(required(sub, "price")?)?,
        quantity: parse_decimal(required(sub, "quantity")?)?,
        fees: optional(sub, "fees")
            .map(parse_decimal)
            .transpose()?
            .unwrap_or(Decimal::ZERO),
        account_id: required(sub, "account")?.to_string(),
        total_amount: optional(sub, "total").map(parse_decimal).transpose()?,
    };
    if tx.price < Decimal::ZERO || tx.quantity < Decimal::ZERO || tx.fees < Decimal::ZERO {
        bail!("Price, quantity and fees must not be negative");
    }
    let id = insert_transaction(conn, &tx)?;
    println!(
        "Recorded {} {} {}-{} @ {} (#{})",
        tx.kind.as_str(),
        tx.quantity,
        tx.market,
        tx.ticker,
        tx.price,
        id
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json, jsonl) = output_flags(sub);
    let txs = load_transactions(conn)?;
    if maybe_print_json(json, jsonl, &txs)? {
        return Ok(());
    }
    let data = txs
        .into_iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.date.to_string(),
                t.account_id,
                t.market.to_string(),
                t.ticker,
                t.kind.as_str().to_string(),
                t.quantity.to_string(),
                t.price.to_string(),
                t.fees.to_string(),
                t.total_amount.map(|v| v.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &[
                "Id", "Date", "Account", "Market", "Ticker", "Kind", "Qty", "Price", "Fees",
                "Total"
            ],
            data
        )
    );
    Ok(())
}
