// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{optional, output_flags, required};
use crate::models::{Market, price_key};
use crate::utils::{maybe_print_json, parse_decimal, pretty_table};
use anyhow::{Result, bail};
use rusqlite::{Connection, params};
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let market: Market = required(sub, "market")?.parse()?;
            let ticker = required(sub, "ticker")?.to_uppercase();
            let price = parse_decimal(required(sub, "price")?)?;
            if price.is_sign_negative() {
                bail!("Price must not be negative");
            }
            let change = optional(sub, "change").map(parse_decimal).transpose()?;
            let change_percent = optional(sub, "change-percent")
                .map(parse_decimal)
                .transpose()?;
            conn.execute(
                "INSERT INTO prices(market, ticker, price, change, change_percent) VALUES (?1,?2,?3,?4,?5)
                 ON CONFLICT(market, ticker) DO UPDATE SET price=excluded.price,
                   change=excluded.change, change_percent=excluded.change_percent",
                params![
                    market.code(),
                    ticker,
                    price.to_string(),
                    change.map(|d| d.to_string()),
                    change_percent.map(|d| d.to_string()),
                ],
            )?;
            println!("{} = {} {}", price_key(market, &ticker), price, market.native_currency());
        }
        Some(("list", sub)) => {
            let (json_flag, jsonl) = output_flags(sub);
            let mut stmt = conn.prepare(
                "SELECT market, ticker, price, change, change_percent FROM prices ORDER BY market, ticker",
            )?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (m, t, p, c, cp) = row?;
                data.push(vec![m, t, p, c.unwrap_or_default(), cp.unwrap_or_default()]);
            }
            let items: Vec<_> = data
                .iter()
                .map(|r| {
                    json!({
                        "market": r[0],
                        "ticker": r[1],
                        "price": r[2],
                        "change": r[3],
                        "change_percent": r[4],
                    })
                })
                .collect();
            if maybe_print_json(json_flag, jsonl, &items)? {
                return Ok(());
            }
            println!(
                "{}",
                pretty_table(&["Market", "Ticker", "Price", "Change", "Change %"], data)
            );
        }
        _ => {}
    }
    Ok(())
}
