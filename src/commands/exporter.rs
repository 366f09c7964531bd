// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::required;
use crate::db::load_document;
use crate::document::LedgerDocument;
use anyhow::{Context, Result, bail};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let out = required(m, "path")?;
    let fmt = m
        .get_one::<String>("format")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "json".into());
    let doc = load_document(conn)?;

    match fmt.as_str() {
        "json" => {
            std::fs::write(out, doc.to_json_pretty()?).with_context(|| format!("Write {}", out))?
        }
        "csv" => write_transactions_csv(&doc, out)?,
        other => bail!("Unknown format: {} (use json|csv)", other),
    }
    println!("Exported ledger to {} ({})", out, fmt);
    Ok(())
}

fn write_transactions_csv(doc: &LedgerDocument, out: &str) -> Result<()> {
    let mut wtr = csv::Writer::from_path(out).with_context(|| format!("Create {}", out))?;
    wtr.write_record([
        "id", "date", "account_id", "market", "ticker", "kind", "quantity", "price", "fees",
        "total_amount",
    ])?;
    for t in &doc.transactions {
        wtr.write_record([
            t.id.to_string(),
            t.date.to_string(),
            t.account_id.clone(),
            t.market.to_string(),
            t.ticker.clone(),
            t.kind.as_str().to_string(),
            t.quantity.to_string(),
            t.price.to_string(),
            t.fees.to_string(),
            t.total_amount.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
