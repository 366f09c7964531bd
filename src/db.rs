// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::document::LedgerDocument;
use crate::models::{Account, CashFlow, HistoricalYear, PriceDetail, Transaction};
use crate::utils::{get_reporting_currency, set_reporting_currency};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use log::debug;
use once_cell::sync::Lazy;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Portfold", "portfold"));

pub const DB_ENV: &str = "PORTFOLD_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(DB_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("portfold.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        currency TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- Events keep their account id even if the account is removed;
    -- replay reports them as orphans instead of cascading deletes.
    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        ticker TEXT NOT NULL,
        market TEXT NOT NULL,
        kind TEXT NOT NULL,
        price TEXT NOT NULL,
        quantity TEXT NOT NULL,
        fees TEXT NOT NULL DEFAULT '0',
        account_id TEXT NOT NULL,
        total_amount TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    CREATE TABLE IF NOT EXISTS cash_flows(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        kind TEXT NOT NULL,
        amount TEXT NOT NULL,
        amount_reporting TEXT,
        fee TEXT,
        account_id TEXT NOT NULL,
        target_account_id TEXT,
        exchange_rate TEXT,
        category TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_cash_flows_date ON cash_flows(date);

    CREATE TABLE IF NOT EXISTS prices(
        market TEXT NOT NULL,
        ticker TEXT NOT NULL,
        price TEXT NOT NULL,
        change TEXT,
        change_percent TEXT,
        PRIMARY KEY(market, ticker)
    );

    -- Reporting-currency units per one unit of `currency`
    CREATE TABLE IF NOT EXISTS fx_rates(
        currency TEXT PRIMARY KEY,
        rate TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS historical_prices(
        year INTEGER NOT NULL,
        key TEXT NOT NULL,
        price TEXT NOT NULL,
        PRIMARY KEY(year, key)
    );

    CREATE TABLE IF NOT EXISTS historical_rates(
        year INTEGER NOT NULL,
        currency TEXT NOT NULL,
        rate TEXT NOT NULL,
        PRIMARY KEY(year, currency)
    );

    CREATE TABLE IF NOT EXISTS historical_totals(
        year INTEGER PRIMARY KEY,
        total_assets TEXT NOT NULL
    );
    "#,
    )?;
    Ok(())
}

fn dec(raw: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str_exact(raw).with_context(|| format!("Invalid {} '{}' in database", what, raw))
}

fn opt_dec(raw: Option<String>, what: &str) -> Result<Option<Decimal>> {
    raw.map(|s| dec(&s, what)).transpose()
}

fn date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' in database", raw))
}

fn opt_text(d: Option<Decimal>) -> Option<String> {
    d.map(|v| v.to_string())
}

/// Row ids of zero or below let SQLite assign the next id.
fn row_id(id: i64) -> Option<i64> {
    (id > 0).then_some(id)
}

pub fn insert_account(conn: &Connection, account: &Account) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts(id, name, currency) VALUES (?1, ?2, ?3)",
        params![account.id, account.name, account.currency],
    )
    .with_context(|| format!("Insert account '{}'", account.id))?;
    Ok(())
}

pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(id, date, ticker, market, kind, price, quantity, fees, account_id, total_amount) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            row_id(tx.id),
            tx.date.to_string(),
            tx.ticker,
            tx.market.code(),
            tx.kind.as_str(),
            tx.price.to_string(),
            tx.quantity.to_string(),
            tx.fees.to_string(),
            tx.account_id,
            opt_text(tx.total_amount),
        ],
    )
    .with_context(|| format!("Insert transaction {}", tx.id))?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_cash_flow(conn: &Connection, flow: &CashFlow) -> Result<i64> {
    conn.execute(
        "INSERT INTO cash_flows(id, date, kind, amount, amount_reporting, fee, account_id, target_account_id, exchange_rate, category) \
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            row_id(flow.id),
            flow.date.to_string(),
            flow.kind.as_str(),
            flow.amount.to_string(),
            opt_text(flow.amount_reporting),
            opt_text(flow.fee),
            flow.account_id,
            flow.target_account_id,
            opt_text(flow.exchange_rate),
            flow.category,
        ],
    )
    .with_context(|| format!("Insert cash flow {}", flow.id))?;
    Ok(conn.last_insert_rowid())
}

pub fn load_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, name, currency FROM accounts ORDER BY id")?;
    let rows = stmt.query_map([], |r| {
        Ok(Account {
            id: r.get(0)?,
            name: r.get(1)?,
            currency: r.get(2)?,
            balance: Decimal::ZERO,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn load_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, ticker, market, kind, price, quantity, fees, account_id, total_amount \
         FROM transactions ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, String>(7)?,
            r.get::<_, String>(8)?,
            r.get::<_, Option<String>>(9)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, d, ticker, market, kind, price, qty, fees, account_id, total) = row?;
        out.push(Transaction {
            id,
            date: date(&d)?,
            ticker,
            market: market.parse()?,
            kind: kind.parse()?,
            price: dec(&price, "price")?,
            quantity: dec(&qty, "quantity")?,
            fees: dec(&fees, "fees")?,
            account_id,
            total_amount: opt_dec(total, "total amount")?,
        });
    }
    Ok(out)
}

pub fn load_cash_flows(conn: &Connection) -> Result<Vec<CashFlow>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, kind, amount, amount_reporting, fee, account_id, target_account_id, exchange_rate, category \
         FROM cash_flows ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, Option<String>>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, Option<String>>(7)?,
            r.get::<_, Option<String>>(8)?,
            r.get::<_, Option<String>>(9)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, d, kind, amount, reporting, fee, account_id, target, rate, category) = row?;
        out.push(CashFlow {
            id,
            date: date(&d)?,
            kind: kind.parse()?,
            amount: dec(&amount, "amount")?,
            amount_reporting: opt_dec(reporting, "reporting amount")?,
            fee: opt_dec(fee, "fee")?,
            account_id,
            target_account_id: target,
            exchange_rate: opt_dec(rate, "exchange rate")?,
            category,
        });
    }
    Ok(out)
}

fn load_pairs(conn: &Connection, sql: &str, what: &str) -> Result<BTreeMap<String, Decimal>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (key, raw) = row?;
        out.insert(key, dec(&raw, what)?);
    }
    Ok(out)
}

fn load_historical(conn: &Connection) -> Result<BTreeMap<i32, HistoricalYear>> {
    let mut years: BTreeMap<i32, HistoricalYear> = BTreeMap::new();
    for (sql, what) in [
        ("SELECT year, key, price FROM historical_prices", "year-end price"),
        ("SELECT year, currency, rate FROM historical_rates", "year-end rate"),
    ] {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, i32>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (year, key, raw) = row?;
            let value = dec(&raw, what)?;
            let entry = years.entry(year).or_default();
            if what == "year-end price" {
                entry.prices.insert(key, value);
            } else {
                entry.exchange_rates.insert(key, value);
            }
        }
    }

    let mut stmt = conn.prepare("SELECT year, total_assets FROM historical_totals")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i32>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (year, raw) = row?;
        years.entry(year).or_default().total_assets = Some(dec(&raw, "total assets")?);
    }
    Ok(years)
}

/// Immutable snapshot of the stored ledger for the engine.
pub fn load_document(conn: &Connection) -> Result<LedgerDocument> {
    let mut prices = BTreeMap::new();
    let mut price_details = BTreeMap::new();
    let mut stmt =
        conn.prepare("SELECT market, ticker, price, change, change_percent FROM prices")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, Option<String>>(3)?,
            r.get::<_, Option<String>>(4)?,
        ))
    })?;
    for row in rows {
        let (market, ticker, price, change, change_percent) = row?;
        let key = format!("{}-{}", market, ticker);
        prices.insert(key.clone(), dec(&price, "price")?);
        if change.is_some() || change_percent.is_some() {
            price_details.insert(
                key,
                PriceDetail {
                    change: opt_dec(change, "price change")?.unwrap_or(Decimal::ZERO),
                    change_percent: opt_dec(change_percent, "price change percent")?
                        .unwrap_or(Decimal::ZERO),
                },
            );
        }
    }

    let doc = LedgerDocument {
        reporting_currency: get_reporting_currency(conn)?,
        accounts: load_accounts(conn)?,
        transactions: load_transactions(conn)?,
        cash_flows: load_cash_flows(conn)?,
        exchange_rates: load_pairs(conn, "SELECT currency, rate FROM fx_rates", "rate")?,
        prices,
        price_details,
        historical_data: load_historical(conn)?,
        ..LedgerDocument::default()
    };
    debug!(
        "Loaded ledger: {} accounts, {} transactions, {} cash flows",
        doc.accounts.len(),
        doc.transactions.len(),
        doc.cash_flows.len()
    );
    Ok(doc)
}

/// Replaces every stored ledger table with `doc` in one SQLite transaction.
pub fn replace_document(conn: &mut Connection, doc: &LedgerDocument) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM accounts; DELETE FROM transactions; DELETE FROM cash_flows;
         DELETE FROM prices; DELETE FROM fx_rates; DELETE FROM historical_prices;
         DELETE FROM historical_rates; DELETE FROM historical_totals;",
    )?;
    set_reporting_currency(&tx, &doc.reporting_currency)?;

    for account in &doc.accounts {
        insert_account(&tx, account)?;
    }
    for t in &doc.transactions {
        insert_transaction(&tx, t)?;
    }
    for flow in &doc.cash_flows {
        insert_cash_flow(&tx, flow)?;
    }
    for (key, price) in &doc.prices {
        let (market, ticker) = key
            .split_once('-')
            .with_context(|| format!("Price key '{}' is not MARKET-TICKER", key))?;
        let detail = doc.price_details.get(key);
        tx.execute(
            "INSERT INTO prices(market, ticker, price, change, change_percent) VALUES (?1,?2,?3,?4,?5)",
            params![
                market,
                ticker,
                price.to_string(),
                detail.map(|d| d.change.to_string()),
                detail.map(|d| d.change_percent.to_string()),
            ],
        )?;
    }
    for (currency, rate) in &doc.exchange_rates {
        tx.execute(
            "INSERT INTO fx_rates(currency, rate) VALUES (?1, ?2)",
            params![currency, rate.to_string()],
        )?;
    }
    for (year, data) in &doc.historical_data {
        for (key, price) in &data.prices {
            tx.execute(
                "INSERT INTO historical_prices(year, key, price) VALUES (?1,?2,?3)",
                params![year, key, price.to_string()],
            )?;
        }
        for (currency, rate) in &data.exchange_rates {
            tx.execute(
                "INSERT INTO historical_rates(year, currency, rate) VALUES (?1,?2,?3)",
                params![year, currency, rate.to_string()],
            )?;
        }
        if let Some(total) = data.total_assets {
            tx.execute(
                "INSERT INTO historical_totals(year, total_assets) VALUES (?1, ?2)",
                params![year, total.to_string()],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}
