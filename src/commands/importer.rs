// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::required;
use crate::db::replace_document;
use crate::document::parse_document;
use anyhow::{Context, Result};
use log::info;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let path = required(m, "path")?;
    let raw = std::fs::read_to_string(path).with_context(|| format!("Read {}", path))?;
    let doc = parse_document(&raw).with_context(|| format!("Import {}", path))?;
    replace_document(conn, &doc).context("Replace stored ledger")?;
    info!(
        "Imported {} accounts, {} transactions, {} cash flows",
        doc.accounts.len(),
        doc.transactions.len(),
        doc.cash_flows.len()
    );
    println!(
        "Imported {} accounts, {} transactions and {} cash flows from {}",
        doc.accounts.len(),
        doc.transactions.len(),
        doc.cash_flows.len(),
        path
    );
    Ok(())
}
