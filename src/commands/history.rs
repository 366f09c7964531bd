// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{output_flags, required};
use crate::db::load_document;
use crate::models::{Market, price_key};
use crate::utils::{maybe_print_json, parse_currency, parse_decimal, pretty_table};
use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

fn year(sub: &clap::ArgMatches) -> Result<i32> {
    sub.get_one::<i32>("year").copied().context("Missing --year")
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("price", sub)) => {
            let year = year(sub)?;
            let market: Market = required(sub, "market")?.parse()?;
            let key = price_key(market, &required(sub, "ticker")?.to_uppercase());
            let price = parse_decimal(required(sub, "price")?)?;
            if price.is_sign_negative() {
                bail!("Price must not be negative");
            }
            conn.execute(
                "INSERT INTO historical_prices(year, key, price) VALUES (?1,?2,?3)
                 ON CONFLICT(year, key) DO UPDATE SET price=excluded.price",
                params![year, key, price.to_string()],
            )?;
            println!("{} year-end {} = {}", year, key, price);
        }
        Some(("rate", sub)) => {
            let year = year(sub)?;
            let ccy = parse_currency(required(sub, "currency")?)?;
            let rate = parse_decimal(required(sub, "rate")?)?;
            if rate <= rust_decimal::Decimal::ZERO {
                bail!("Rate must be positive");
            }
            conn.execute(
                "INSERT INTO historical_rates(year, currency, rate) VALUES (?1,?2,?3)
                 ON CONFLICT(year, currency) DO UPDATE SET rate=excluded.rate",
                params![year, ccy, rate.to_string()],
            )?;
            println!("{} year-end 1 {} = {}", year, ccy, rate);
        }
        Some(("total", sub)) => {
            let year = year(sub)?;
            let amount = parse_decimal(required(sub, "amount")?)?;
            conn.execute(
                "INSERT INTO historical_totals(year, total_assets) VALUES (?1, ?2)
                 ON CONFLICT(year) DO UPDATE SET total_assets=excluded.total_assets",
                params![year, amount.to_string()],
            )?;
            println!("{} total assets = {}", year, amount);
        }
        Some(("list", sub)) => {
            let (json, jsonl) = output_flags(sub);
            let history = load_document(conn)?.historical_data;
            if maybe_print_json(json, jsonl, &history)? {
                return Ok(());
            }
            let mut data = Vec::new();
            for (year, y) in &history {
                for (key, price) in &y.prices {
                    data.push(vec![
                        year.to_string(),
                        "price".into(),
                        key.clone(),
                        price.to_string(),
                    ]);
                }
                for (ccy, rate) in &y.exchange_rates {
                    data.push(vec![year.to_string(), "rate".into(), ccy.clone(), rate.to_string()]);
                }
                if let Some(total) = y.total_assets {
                    data.push(vec![
                        year.to_string(),
                        "total".into(),
                        String::new(),
                        total.to_string(),
                    ]);
                }
            }
            println!("{}", pretty_table(&["Year", "Type", "Key", "Value"], data));
        }
        _ => {}
    }
    Ok(())
}
