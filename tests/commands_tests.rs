// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use portfold::commands::{accounts, cash, doctor, fx, history, prices, reports, trades};
use portfold::{cli, db, utils};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["portfold"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().try_get_matches_from(argv)?;
    match matches.subcommand() {
        Some(("account", sub)) => accounts::handle(conn, sub),
        Some(("trade", sub)) => trades::handle(conn, sub),
        Some(("cash", sub)) => cash::handle(conn, sub),
        Some(("price", sub)) => prices::handle(conn, sub),
        Some(("fx", sub)) => fx::handle(conn, sub),
        Some(("history", sub)) => history::handle(conn, sub),
        Some(("report", sub)) => reports::handle(conn, sub),
        other => panic!("unexpected subcommand {:?}", other.map(|(n, _)| n)),
    }
}

fn seeded() -> Connection {
    let conn = conn();
    run(&conn, &["account", "add", "--id", "tw", "--name", "Local", "--currency", "twd"]).unwrap();
    run(
        &conn,
        &[
            "account",
            "add",
            "--id",
            "us",
            "--name",
            "Overseas",
            "--currency",
            "USD",
        ],
    )
    .unwrap();
    run(
        &conn,
        &[
            "cash", "add", "--kind", "deposit", "--date", "2024-01-01", "--account", "tw",
            "--amount", "10000",
        ],
    )
    .unwrap();
    run(
        &conn,
        &[
            "trade", "add", "--kind", "buy", "--date", "2024-01-02", "--account", "tw", "--market",
            "tw", "--ticker", "2330", "--quantity", "100", "--price", "90", "--fees", "20",
        ],
    )
    .unwrap();
    conn
}

#[test]
fn account_balances_come_from_replay() {
    let conn = seeded();
    let listed = accounts::list_with_balances(&conn).unwrap();
    let tw = listed.iter().find(|a| a.id == "tw").unwrap();
    assert_eq!(tw.currency, "TWD");
    assert_eq!(tw.balance, d("980"));
    run(&conn, &["account", "list", "--json"]).unwrap();
}

#[test]
fn transfer_requires_target_and_rejects_self() {
    let conn = seeded();
    let base = [
        "cash", "add", "--kind", "transfer", "--date", "2024-02-01", "--account", "tw",
        "--amount", "3200",
    ];
    assert!(run(&conn, &base).is_err());

    let mut to_self = base.to_vec();
    to_self.extend(["--to", "tw"]);
    assert!(run(&conn, &to_self).is_err());

    let mut ok = base.to_vec();
    ok.extend(["--to", "us", "--rate", "32"]);
    run(&conn, &ok).unwrap();

    let balances = accounts::list_with_balances(&conn).unwrap();
    let us = balances.iter().find(|a| a.id == "us").unwrap();
    assert_eq!(us.balance, d("100"));
}

#[test]
fn report_values_holdings_at_live_price() {
    let conn = seeded();
    run(
        &conn,
        &[
            "price",
            "set",
            "--market",
            "TW",
            "--ticker",
            "2330",
            "--price",
            "100",
            "--change",
            "2",
        ],
    )
    .unwrap();

    let report = reports::load_report(&conn, date("2024-06-30")).unwrap();
    let h = &report.holdings[0];
    assert_eq!(h.current_value, d("10000"));
    assert_eq!(h.unrealized_pl, d("980"));
    assert_eq!(h.day_change, d("200"));
    assert_eq!(report.total_value, d("10980"));
    assert!(report.warnings.is_empty());
}

#[test]
fn lots_as_of_replays_only_earlier_events() {
    let conn = seeded();
    run(
        &conn,
        &[
            "trade", "add", "--kind", "sell", "--date", "2024-03-01", "--account", "tw", "--market",
            "TW", "--ticker", "2330", "--quantity", "40", "--price", "95",
        ],
    )
    .unwrap();

    let before = reports::lots_as_of(&conn, date("2024-02-01")).unwrap();
    assert_eq!(before[0].quantity, d("100"));
    assert_eq!(before[0].realized_pl, Decimal::ZERO);

    let after = reports::lots_as_of(&conn, date("2024-03-01")).unwrap();
    assert_eq!(after[0].quantity, d("60"));
    assert_eq!(after[0].average_cost, d("90.2"));
    assert_eq!(after[0].realized_pl, d("3800") - d("3608"));
}

#[test]
fn reporting_currency_and_rates_feed_valuation() {
    let conn = seeded();
    run(&conn, &["fx", "base", "--currency", "usd"]).unwrap();
    assert_eq!(utils::get_reporting_currency(&conn).unwrap(), "USD");
    run(&conn, &["fx", "set", "--currency", "TWD", "--rate", "0.03125"]).unwrap();
    assert!(run(&conn, &["fx", "set", "--currency", "JPY", "--rate", "0"]).is_err());
    run(&conn, &["price", "set", "--market", "TW", "--ticker", "2330", "--price", "100"]).unwrap();

    let report = reports::load_report(&conn, date("2024-06-30")).unwrap();
    assert_eq!(report.reporting_currency, "USD");
    assert_eq!(report.holdings[0].current_value, d("312.5"));
    assert_eq!(report.total_cash, d("30.625"));
}

#[test]
fn history_entries_are_stored_per_year() {
    let conn = seeded();
    run(
        &conn,
        &[
            "history",
            "price",
            "--year",
            "2023",
            "--market",
            "US",
            "--ticker",
            "vt",
            "--price",
            "95",
        ],
    )
    .unwrap();
    run(
        &conn,
        &[
            "history",
            "rate",
            "--year",
            "2023",
            "--currency",
            "USD",
            "--rate",
            "30.7",
        ],
    )
    .unwrap();
    run(&conn, &["history", "total", "--year", "2023", "--amount", "12345"]).unwrap();
    run(
        &conn,
        &[
            "history",
            "price",
            "--year",
            "2023",
            "--market",
            "US",
            "--ticker",
            "VT",
            "--price",
            "96",
        ],
    )
    .unwrap();

    let doc = db::load_document(&conn).unwrap();
    let y = &doc.historical_data[&2023];
    assert_eq!(y.prices["US-VT"], d("96"));
    assert_eq!(y.exchange_rates["USD"], d("30.7"));
    assert_eq!(y.total_assets, Some(d("12345")));
}

#[test]
fn doctor_flags_missing_data_and_orphans() {
    let conn = seeded();
    run(
        &conn,
        &[
            "trade", "add", "--kind", "buy", "--date", "2024-02-01", "--account", "us", "--market",
            "US", "--ticker", "VT", "--quantity", "1", "--price", "100",
        ],
    )
    .unwrap();
    run(&conn, &["account", "rm", "--id", "us"]).unwrap();

    let doc = db::load_document(&conn).unwrap();
    let issues = doctor::diagnose(&doc, date("2024-06-30"));
    let kinds: Vec<&str> = issues.iter().map(|r| r[0].as_str()).collect();
    assert!(kinds.contains(&"orphan_account"));
    assert!(kinds.contains(&"missing_price"));
    assert!(!kinds.contains(&"missing_fx"));
}

#[test]
fn doctor_reports_each_unpriced_security_once() {
    let conn = seeded();
    run(
        &conn,
        &[
            "trade", "add", "--kind", "buy", "--date", "2024-02-01", "--account", "us", "--market",
            "TW", "--ticker", "2330", "--quantity", "5", "--price", "95",
        ],
    )
    .unwrap();

    let doc = db::load_document(&conn).unwrap();
    let issues = doctor::diagnose(&doc, date("2024-06-30"));
    let missing: Vec<&Vec<String>> = issues.iter().filter(|r| r[0] == "missing_price").collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0][1], "TW-2330");
}
