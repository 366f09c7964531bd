// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{output_flags, required};
use crate::db::{insert_account, load_document};
use crate::engine::replay;
use crate::models::Account;
use crate::utils::{maybe_print_json, parse_currency, pretty_table};
use anyhow::{Result, bail};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let account = Account {
                id: required(sub, "id")?.to_string(),
                name: required(sub, "name")?.to_string(),
                currency: parse_currency(required(sub, "currency")?)?,
                balance: Decimal::ZERO,
            };
            insert_account(conn, &account)?;
            println!(
                "Added account '{}' ({}, {})",
                account.id, account.name, account.currency
            );
        }
        Some(("list", sub)) => {
            let (json, jsonl) = output_flags(sub);
            let accounts = list_with_balances(conn)?;
            if maybe_print_json(json, jsonl, &accounts)? {
                return Ok(());
            }
            let data = accounts
                .into_iter()
                .map(|a| vec![a.id, a.name, a.currency, a.balance.round_dp(2).to_string()])
                .collect();
            println!(
                "{}",
                pretty_table(&["Id", "Name", "Currency", "Cash"], data)
            );
        }
        Some(("rm", sub)) => {
            let id = required(sub, "id")?;
            let removed = conn.execute("DELETE FROM accounts WHERE id=?1", params![id])?;
            if removed == 0 {
                bail!("Account '{}' not found", id);
            }
            println!("Removed account '{}'", id);
        }
        _ => {}
    }
    Ok(())
}

/// Accounts with cash balances derived by replaying the whole ledger.
pub fn list_with_balances(conn: &Connection) -> Result<Vec<Account>> {
    let doc = load_document(conn)?;
    let state = replay(
        &doc.accounts,
        &doc.transactions,
        &doc.cash_flows,
        &doc.normalizer(),
        None,
    );
    Ok(state.accounts_with_balances(&doc.accounts))
}
