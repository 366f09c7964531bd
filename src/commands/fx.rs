// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{output_flags, required};
use crate::utils::{
    get_reporting_currency, maybe_print_json, parse_currency, parse_decimal, pretty_table,
    set_reporting_currency,
};
use anyhow::{Result, bail};
use rusqlite::{Connection, params};
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("base", sub)) => {
            let ccy = parse_currency(required(sub, "currency")?)?;
            set_reporting_currency(conn, &ccy)?;
            println!("Reporting currency set to {}", ccy);
            println!("Rates are reporting units per one unit; re-enter them for {}.", ccy);
        }
        Some(("set", sub)) => {
            let ccy = parse_currency(required(sub, "currency")?)?;
            let rate = parse_decimal(required(sub, "rate")?)?;
            if rate <= rust_decimal::Decimal::ZERO {
                bail!("Rate must be positive");
            }
            conn.execute(
                "INSERT INTO fx_rates(currency, rate) VALUES (?1, ?2)
                 ON CONFLICT(currency) DO UPDATE SET rate=excluded.rate",
                params![ccy, rate.to_string()],
            )?;
            let base = get_reporting_currency(conn)?;
            println!("1 {} = {} {}", ccy, rate, base);
        }
        Some(("list", sub)) => list_rates(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn list_rates(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl) = output_flags(sub);
    let base = get_reporting_currency(conn)?;
    let mut stmt = conn.prepare("SELECT currency, rate FROM fx_rates ORDER BY currency")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut data = Vec::new();
    for row in rows {
        let (c, r) = row?;
        data.push(vec![c, r, base.clone()]);
    }
    let items: Vec<_> = data
        .iter()
        .map(|r| json!({"currency": r[0], "rate": r[1], "reporting_currency": r[2]}))
        .collect();
    if maybe_print_json(json_flag, jsonl, &items)? {
        return Ok(());
    }
    println!("{}", pretty_table(&["Currency", "Rate", "Per unit in"], data));
    Ok(())
}
