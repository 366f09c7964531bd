// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use portfold::document::{LedgerDocument, parse_document};
use portfold::engine::{LotKey, WarningKind, project, replay, state_as_of};
use portfold::models::{
    Account, CashFlow, CashFlowKind, HistoricalYear, Market, Transaction, TransactionKind,
};
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn account(id: &str, ccy: &str) -> Account {
    Account {
        id: id.into(),
        name: id.into(),
        currency: ccy.into(),
        balance: Decimal::ZERO,
    }
}

#[allow(clippy::too_many_arguments)]
fn tx(
    id: i64,
    day: &str,
    account_id: &str,
    market: Market,
    ticker: &str,
    kind: TransactionKind,
    qty: &str,
    price: &str,
    fees: &str,
) -> Transaction {
    Transaction {
        id,
        date: date(day),
        ticker: ticker.into(),
        market,
        kind,
        price: d(price),
        quantity: d(qty),
        fees: d(fees),
        account_id: account_id.into(),
        total_amount: None,
    }
}

fn flow(id: i64, day: &str, account_id: &str, kind: CashFlowKind, amount: &str) -> CashFlow {
    CashFlow {
        id,
        date: date(day),
        kind,
        amount: d(amount),
        amount_reporting: None,
        fee: None,
        account_id: account_id.into(),
        target_account_id: None,
        exchange_rate: None,
        category: None,
    }
}

fn tw_doc() -> LedgerDocument {
    LedgerDocument {
        accounts: vec![account("tw", "TWD")],
        ..LedgerDocument::default()
    }
}

#[test]
fn deposit_then_buy_values_against_live_price() {
    let mut doc = tw_doc();
    doc.cash_flows
        .push(flow(1, "2024-01-01", "tw", CashFlowKind::Deposit, "10000"));
    doc.transactions.push(tx(
        1,
        "2024-01-02",
        "tw",
        Market::Tw,
        "2330",
        TransactionKind::Buy,
        "100",
        "90",
        "20",
    ));
    doc.prices.insert("TW-2330".into(), d("100"));

    let report = project(&doc, date("2024-06-30"));
    let h = &report.holdings[0];
    assert_eq!(h.quantity, d("100"));
    assert_eq!(h.total_cost, d("9020"));
    assert_eq!(h.average_cost, d("90.2"));
    assert_eq!(h.current_value, d("10000"));
    assert_eq!(h.unrealized_pl, d("980"));
    assert_eq!(h.unrealized_pl_percent.round_dp(2), d("10.86"));
    assert_eq!(report.total_cash, d("980"));
    assert_eq!(report.accounts[0].balance, d("980"));
    assert_eq!(report.total_value, d("10980"));
}

#[test]
fn partial_sell_keeps_average_cost_and_credits_proceeds() {
    let mut doc = tw_doc();
    doc.transactions = vec![
        tx(1, "2024-01-02", "tw", Market::Tw, "0050", TransactionKind::Buy, "100", "10", "0"),
        tx(2, "2024-02-02", "tw", Market::Tw, "0050", TransactionKind::Sell, "40", "12", "0"),
    ];
    let state = state_as_of(&doc, date("2024-12-31"));
    let lot = &state.lots[&LotKey::new("tw", Market::Tw, "0050")];
    assert_eq!(lot.quantity, d("60"));
    assert_eq!(lot.total_cost, d("600"));
    assert_eq!(lot.average_cost(), d("10"));
    assert_eq!(lot.realized_pl, d("80"));
    assert_eq!(state.cash_of("tw"), d("-1000") + d("480"));
}

#[test]
fn cross_currency_transfer_converts_at_stated_rate() {
    let mut doc = LedgerDocument {
        accounts: vec![account("tw", "TWD"), account("us", "USD")],
        ..LedgerDocument::default()
    };
    let mut transfer = flow(1, "2024-03-01", "tw", CashFlowKind::Transfer, "1000");
    transfer.target_account_id = Some("us".into());
    transfer.exchange_rate = Some(d("32"));
    doc.cash_flows.push(transfer);

    let state = state_as_of(&doc, date("2024-12-31"));
    assert_eq!(state.cash_of("tw"), d("-1000"));
    assert_eq!(state.cash_of("us"), d("31.25"));
}

#[test]
fn oversell_clamps_to_zero_and_warns() {
    let mut doc = tw_doc();
    doc.transactions = vec![
        tx(1, "2024-01-02", "tw", Market::Tw, "2330", TransactionKind::Buy, "10", "500", "0"),
        tx(2, "2024-01-03", "tw", Market::Tw, "2330", TransactionKind::Sell, "15", "600", "0"),
    ];
    let state = state_as_of(&doc, date("2024-12-31"));
    let lot = &state.lots[&LotKey::new("tw", Market::Tw, "2330")];
    assert_eq!(lot.quantity, Decimal::ZERO);
    assert_eq!(lot.total_cost, Decimal::ZERO);
    assert_eq!(state.warnings.len(), 1);
    assert_eq!(state.warnings[0].kind, WarningKind::Oversold);
    assert_eq!(state.open_lots().count(), 0);
}

#[test]
fn security_transfer_carries_source_cost() {
    let mut doc = LedgerDocument {
        accounts: vec![account("a", "USD"), account("b", "USD")],
        ..LedgerDocument::default()
    };
    doc.transactions = vec![
        tx(1, "2024-01-02", "a", Market::Us, "VT", TransactionKind::Buy, "10", "100", "10"),
        tx(2, "2024-05-01", "a", Market::Us, "VT", TransactionKind::TransferOut, "4", "0", "0"),
        tx(3, "2024-05-01", "b", Market::Us, "VT", TransactionKind::TransferIn, "4", "0", "0"),
    ];
    let state = state_as_of(&doc, date("2024-12-31"));
    let src = &state.lots[&LotKey::new("a", Market::Us, "VT")];
    let dst = &state.lots[&LotKey::new("b", Market::Us, "VT")];
    assert_eq!(src.quantity, d("6"));
    assert_eq!(dst.quantity, d("4"));
    assert_eq!(dst.average_cost(), d("101"));
    assert_eq!(src.average_cost(), d("101"));
    assert!(state.warnings.is_empty());
}

#[test]
fn quantity_identity_holds() {
    let mut doc = tw_doc();
    doc.transactions = vec![
        tx(1, "2023-01-02", "tw", Market::Tw, "2330", TransactionKind::Buy, "100", "500", "0"),
        tx(
            2,
            "2023-06-02",
            "tw",
            Market::Tw,
            "2330",
            TransactionKind::StockDividend,
            "5",
            "0",
            "0",
        ),
        tx(3, "2023-07-02", "tw", Market::Tw, "2330", TransactionKind::Sell, "30", "550", "0"),
        tx(4, "2023-08-02", "tw", Market::Tw, "2330", TransactionKind::Buy, "20", "520", "0"),
        tx(
            5,
            "2023-09-02",
            "tw",
            Market::Tw,
            "2330",
            TransactionKind::CashDividend,
            "95",
            "3",
            "0",
        ),
    ];
    let state = state_as_of(&doc, date("2023-12-31"));
    let lot = &state.lots[&LotKey::new("tw", Market::Tw, "2330")];
    // 100 + 5 - 30 + 20
    assert_eq!(lot.quantity, d("95"));
    assert_eq!(state.dividends["tw"], d("285"));
}

#[test]
fn replay_is_independent_of_input_order() {
    let doc = parse_document(
        r#"{
        "accounts": [
            {"id": "tw", "name": "TW", "currency": "TWD"},
            {"id": "us", "name": "US", "currency": "USD"}
        ],
        "transactions": [
            {"id": 1, "date": "2024-01-02", "ticker": "2330", "market": "TW", "kind": "BUY", "price": "600", "quantity": "10", "fees": "20", "account_id": "tw"},
            {"id": 2, "date": "2024-01-02", "ticker": "2330", "market": "TW", "kind": "SELL", "price": "610", "quantity": "5", "account_id": "tw"},
            {"id": 3, "date": "2024-02-10", "ticker": "VT", "market": "US", "kind": "BUY", "price": "100", "quantity": "3", "account_id": "us"},
            {"id": 4, "date": "2024-02-10", "ticker": "VT", "market": "US", "kind": "CASH_DIVIDEND", "price": "0.5", "quantity": "3", "account_id": "us"}
        ],
        "cash_flows": [
            {"id": 1, "date": "2024-01-01", "kind": "DEPOSIT", "amount": "50000", "account_id": "tw"},
            {"id": 2, "date": "2024-02-01", "kind": "TRANSFER", "amount": "32000", "account_id": "tw", "target_account_id": "us", "exchange_rate": "32"},
            {"id": 3, "date": "2024-02-10", "kind": "WITHDRAW", "amount": "100", "account_id": "us"}
        ],
        "exchange_rates": {"USD": "32"},
        "prices": {"TW-2330": "700", "US-VT": "110"}
    }"#,
    )
    .unwrap();

    let today = date("2024-06-30");
    let expected = project(&doc, today);

    let mut shuffled = doc.clone();
    shuffled.transactions.reverse();
    shuffled.cash_flows.rotate_left(1);
    shuffled.accounts.reverse();
    let again = project(&shuffled, today);

    assert_eq!(again.holdings, expected.holdings);
    assert_eq!(again.total_value, expected.total_value);
    assert_eq!(again.total_cash, expected.total_cash);
    assert_eq!(again.chart, expected.chart);
    assert_eq!(expected.accounts.len(), 2);
}

#[test]
fn holding_and_cash_weights_sum_to_one_hundred() {
    let doc = parse_document(
        r#"{
        "accounts": [
            {"id": "tw", "name": "TW", "currency": "TWD"},
            {"id": "us", "name": "US", "currency": "USD"}
        ],
        "transactions": [
            {"id": 1, "date": "2024-01-02", "ticker": "2330", "market": "TW", "kind": "BUY", "price": "600", "quantity": "7", "account_id": "tw"},
            {"id": 2, "date": "2024-01-03", "ticker": "AAPL", "market": "US", "kind": "BUY", "price": "185.3", "quantity": "3", "account_id": "us"},
            {"id": 3, "date": "2024-01-03", "ticker": "VT", "market": "US", "kind": "BUY", "price": "101.7", "quantity": "11", "account_id": "us"}
        ],
        "cash_flows": [
            {"id": 1, "date": "2024-01-01", "kind": "DEPOSIT", "amount": "10000", "account_id": "tw"},
            {"id": 2, "date": "2024-01-01", "kind": "DEPOSIT", "amount": "2500", "account_id": "us"}
        ],
        "exchange_rates": {"USD": "31.7"},
        "prices": {"TW-2330": "777", "US-AAPL": "190.1", "US-VT": "104.9"}
    }"#,
    )
    .unwrap();

    let report = project(&doc, date("2024-06-30"));
    let held: Decimal = report.holdings.iter().map(|h| h.weight).sum();
    let sum = held + report.cash_weight;
    assert!((sum - Decimal::ONE_HUNDRED).abs() < d("0.01"), "sum {}", sum);

    let allocation: Decimal = report.allocation.iter().map(|a| a.percentage).sum();
    assert!((allocation - Decimal::ONE_HUNDRED).abs() < d("0.01"));
    let account_weights: Decimal = report.account_performance.iter().map(|a| a.weight).sum();
    assert!((account_weights - Decimal::ONE_HUNDRED).abs() < d("0.01"));
}

#[test]
fn past_year_uses_snapshot_or_year_end_prices() {
    let mut doc = tw_doc();
    doc.cash_flows
        .push(flow(1, "2022-01-01", "tw", CashFlowKind::Deposit, "1000"));
    doc.transactions.push(tx(
        1,
        "2022-01-05",
        "tw",
        Market::Tw,
        "0050",
        TransactionKind::Buy,
        "10",
        "100",
        "0",
    ));
    let mut y2022 = HistoricalYear::default();
    y2022.prices.insert("TW-0050".into(), d("120"));
    doc.historical_data.insert(2022, y2022);
    doc.historical_data.insert(
        2023,
        HistoricalYear {
            total_assets: Some(d("1500")),
            ..HistoricalYear::default()
        },
    );
    doc.prices.insert("TW-0050".into(), d("150"));

    let report = project(&doc, date("2024-06-30"));
    let years: Vec<i32> = report.chart.iter().map(|p| p.year).collect();
    assert_eq!(years, vec![2022, 2023, 2024]);

    let p2022 = &report.chart[0];
    assert_eq!(p2022.total_assets, d("1200"));
    assert_eq!(p2022.cumulative_cost, d("1000"));
    assert!(p2022.is_real_data);
    assert_eq!(p2022.cost_ratio.round_dp(2), d("83.33"));

    let p2023 = &report.chart[1];
    assert_eq!(p2023.total_assets, d("1500"));
    assert!(p2023.is_real_data);

    let p2024 = &report.chart[2];
    assert_eq!(p2024.total_assets, d("1500"));
    assert_eq!(p2024.date, date("2024-06-30"));

    let annual = &report.annual_performance;
    assert_eq!(annual[0].profit, d("200"));
    assert_eq!(annual[1].start_assets, d("1200"));
    assert_eq!(annual[1].profit, d("300"));
}

#[test]
fn missing_year_end_price_is_held_forward_and_estimated() {
    let mut doc = tw_doc();
    doc.transactions.push(tx(
        1,
        "2022-03-01",
        "tw",
        Market::Tw,
        "0050",
        TransactionKind::Buy,
        "10",
        "100",
        "0",
    ));
    let mut y2022 = HistoricalYear::default();
    y2022.prices.insert("0050".into(), d("110"));
    doc.historical_data.insert(2022, y2022);

    let report = project(&doc, date("2024-02-01"));
    let p2023 = &report.chart[1];
    assert_eq!(p2023.year, 2023);
    // 10 x 110 held forward, cash -1000
    assert_eq!(p2023.total_assets, d("100"));
    assert!(!p2023.is_real_data);
}

#[test]
fn orphan_flows_do_not_touch_known_accounts() {
    let accounts = vec![account("tw", "TWD")];
    let mut orphan = flow(1, "2024-01-01", "ghost", CashFlowKind::Deposit, "500");
    orphan.fee = Some(d("1"));
    let mut to_ghost = flow(2, "2024-01-02", "tw", CashFlowKind::Transfer, "100");
    to_ghost.target_account_id = Some("ghost".into());
    let flows = vec![
        orphan,
        to_ghost,
        flow(3, "2024-01-03", "tw", CashFlowKind::Deposit, "10"),
    ];

    let doc = tw_doc();
    let state = replay(&accounts, &[], &flows, &doc.normalizer(), None);
    assert_eq!(state.cash_of("tw"), d("10"));
    assert!(!state.cash.contains_key("ghost"));
    assert_eq!(
        state
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::OrphanAccount)
            .count(),
        2
    );
}

#[test]
fn portfolio_xirr_matches_closed_form() {
    let mut doc = tw_doc();
    doc.cash_flows
        .push(flow(1, "2023-01-01", "tw", CashFlowKind::Deposit, "1000"));
    doc.transactions.push(tx(
        1,
        "2023-01-01",
        "tw",
        Market::Tw,
        "0050",
        TransactionKind::Buy,
        "10",
        "100",
        "0",
    ));
    doc.prices.insert("TW-0050".into(), d("110"));

    let report = project(&doc, date("2024-01-01"));
    assert!((report.annualized_return - 10.0).abs() < 1e-4);
    assert!((report.account_performance[0].annualized_return - 10.0).abs() < 1e-4);
}

fn two_account_doc(ccy: &str) -> LedgerDocument {
    LedgerDocument {
        accounts: vec![account("a", ccy), account("b", ccy)],
        ..LedgerDocument::default()
    }
}

#[test]
fn same_day_buy_and_transfer_moves_full_cost() {
    let mut doc = two_account_doc("USD");
    doc.transactions = vec![
        tx(1, "2024-03-01", "a", Market::Us, "VT", TransactionKind::Buy, "10", "100", "0"),
        tx(2, "2024-03-01", "a", Market::Us, "VT", TransactionKind::TransferOut, "10", "0", "0"),
        tx(3, "2024-03-01", "b", Market::Us, "VT", TransactionKind::TransferIn, "10", "0", "0"),
    ];
    let state = state_as_of(&doc, date("2024-12-31"));
    let src = &state.lots[&LotKey::new("a", Market::Us, "VT")];
    let dst = &state.lots[&LotKey::new("b", Market::Us, "VT")];
    assert_eq!(src.quantity, Decimal::ZERO);
    assert_eq!(src.total_cost, Decimal::ZERO);
    assert_eq!(dst.quantity, d("10"));
    assert_eq!(dst.total_cost, d("1000"));
    assert!(state.warnings.is_empty());
}

#[test]
fn transfer_after_same_day_buy_uses_updated_average() {
    let mut doc = two_account_doc("USD");
    doc.transactions = vec![
        tx(1, "2024-01-02", "a", Market::Us, "VT", TransactionKind::Buy, "10", "100", "0"),
        tx(2, "2024-03-01", "a", Market::Us, "VT", TransactionKind::Buy, "10", "120", "0"),
        tx(3, "2024-03-01", "a", Market::Us, "VT", TransactionKind::TransferOut, "5", "0", "0"),
        tx(4, "2024-03-01", "b", Market::Us, "VT", TransactionKind::TransferIn, "5", "0", "0"),
    ];
    let state = state_as_of(&doc, date("2024-12-31"));
    let src = &state.lots[&LotKey::new("a", Market::Us, "VT")];
    let dst = &state.lots[&LotKey::new("b", Market::Us, "VT")];
    assert_eq!(src.quantity, d("15"));
    assert_eq!(src.total_cost, d("1650"));
    assert_eq!(dst.total_cost, d("550"));
    assert_eq!(src.total_cost + dst.total_cost, d("2200"));
    assert_eq!(state.security_transfers.len(), 1);
    assert_eq!(state.security_transfers[0].cost, d("550"));
}

#[test]
fn invalid_flows_add_nothing_to_contributions() {
    let mut doc = tw_doc();
    doc.cash_flows
        .push(flow(1, "2023-01-01", "tw", CashFlowKind::Deposit, "200"));
    let mut negative_fee = flow(2, "2023-02-01", "tw", CashFlowKind::Deposit, "1000");
    negative_fee.fee = Some(d("-5"));
    let mut zero_rate = flow(3, "2023-03-01", "tw", CashFlowKind::Deposit, "300");
    zero_rate.exchange_rate = Some(Decimal::ZERO);
    doc.cash_flows.push(negative_fee);
    doc.cash_flows.push(zero_rate);

    let report = project(&doc, date("2024-06-30"));
    assert_eq!(report.total_cash, d("200"));
    let invalid = report
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::InvalidEvent)
        .count();
    assert_eq!(invalid, 2);

    let p2023 = &report.chart[0];
    assert_eq!(p2023.year, 2023);
    assert_eq!(p2023.cumulative_cost, d("200"));
    assert_eq!(p2023.total_assets, d("200"));
}

#[test]
fn received_securities_count_toward_account_return() {
    let mut doc = two_account_doc("TWD");
    doc.cash_flows
        .push(flow(1, "2023-01-01", "a", CashFlowKind::Deposit, "1000"));
    doc.transactions = vec![
        tx(1, "2023-01-01", "a", Market::Tw, "0050", TransactionKind::Buy, "10", "100", "0"),
        tx(2, "2023-01-01", "a", Market::Tw, "0050", TransactionKind::TransferOut, "10", "0", "0"),
        tx(3, "2023-01-01", "b", Market::Tw, "0050", TransactionKind::TransferIn, "10", "0", "0"),
    ];
    doc.prices.insert("TW-0050".into(), d("110"));

    let report = project(&doc, date("2024-01-01"));
    let b = report
        .account_performance
        .iter()
        .find(|p| p.account_id == "b")
        .unwrap();
    assert_eq!(b.total_value, d("1100"));
    assert!((b.annualized_return - 10.0).abs() < 1e-4);
    assert!((report.annualized_return - 10.0).abs() < 1e-4);
}
