// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::load_document;
use crate::document::LedgerDocument;
use crate::engine::{WarningKind, state_as_of};
use crate::models::price_key;
use crate::utils::{pretty_table, today};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::BTreeSet;

fn issue_name(kind: WarningKind) -> &'static str {
    match kind {
        WarningKind::Oversold => "oversold",
        WarningKind::OrphanAccount => "orphan_account",
        WarningKind::InvalidEvent => "invalid_event",
        WarningKind::UnpairedTransfer => "unpaired_transfer",
    }
}

/// Replay warnings plus live prices and rates the valuation would default.
pub fn diagnose(doc: &LedgerDocument, today: NaiveDate) -> Vec<Vec<String>> {
    let state = state_as_of(doc, today);
    let mut rows: Vec<Vec<String>> = state
        .warnings
        .iter()
        .map(|w| vec![issue_name(w.kind).to_string(), w.to_string()])
        .collect();

    let mut currencies: BTreeSet<&str> =
        doc.accounts.iter().map(|a| a.currency.as_str()).collect();
    let mut unpriced: BTreeSet<String> = BTreeSet::new();
    for (key, _) in state.open_lots() {
        let pk = price_key(key.market, &key.ticker);
        if !doc.prices.contains_key(&pk) && unpriced.insert(pk.clone()) {
            rows.push(vec!["missing_price".into(), pk]);
        }
        currencies.insert(key.market.native_currency());
    }
    for ccy in currencies {
        if ccy != doc.reporting_currency && !doc.exchange_rates.contains_key(ccy) {
            rows.push(vec!["missing_fx".into(), ccy.to_string()]);
        }
    }
    rows
}

pub fn handle(conn: &Connection) -> Result<()> {
    let doc = load_document(conn)?;
    let rows = diagnose(&doc, today());
    if rows.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
