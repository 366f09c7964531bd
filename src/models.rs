// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::anyhow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange a security trades on. Every market settles in its own native currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Tw,
    Us,
    Jp,
    Hk,
    Uk,
}

impl Market {
    pub const ALL: [Market; 5] = [Market::Tw, Market::Us, Market::Jp, Market::Hk, Market::Uk];

    pub fn code(self) -> &'static str {
        match self {
            Market::Tw => "TW",
            Market::Us => "US",
            Market::Jp => "JP",
            Market::Hk => "HK",
            Market::Uk => "UK",
        }
    }

    pub fn native_currency(self) -> &'static str {
        match self {
            Market::Tw => "TWD",
            Market::Us => "USD",
            Market::Jp => "JPY",
            Market::Hk => "HKD",
            Market::Uk => "GBP",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Market {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Market::ALL
            .into_iter()
            .find(|m| m.code() == upper)
            .ok_or_else(|| anyhow!("Unknown market '{}' (use TW|US|JP|HK|UK)", s))
    }
}

/// Key used by price maps: `"MARKET-TICKER"`, e.g. `US-AAPL`.
pub fn price_key(market: Market, ticker: &str) -> String {
    format!("{}-{}", market.code(), ticker)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Buy,
    Sell,
    StockDividend,
    CashDividend,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::StockDividend => "STOCK_DIVIDEND",
            TransactionKind::CashDividend => "CASH_DIVIDEND",
            TransactionKind::TransferIn => "TRANSFER_IN",
            TransactionKind::TransferOut => "TRANSFER_OUT",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "BUY" => Ok(TransactionKind::Buy),
            "SELL" => Ok(TransactionKind::Sell),
            "STOCK_DIVIDEND" => Ok(TransactionKind::StockDividend),
            "CASH_DIVIDEND" => Ok(TransactionKind::CashDividend),
            "TRANSFER_IN" => Ok(TransactionKind::TransferIn),
            "TRANSFER_OUT" => Ok(TransactionKind::TransferOut),
            _ => Err(anyhow!("Unknown transaction kind '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CashFlowKind {
    Deposit,
    Withdraw,
    Transfer,
    Interest,
}

impl CashFlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CashFlowKind::Deposit => "DEPOSIT",
            CashFlowKind::Withdraw => "WITHDRAW",
            CashFlowKind::Transfer => "TRANSFER",
            CashFlowKind::Interest => "INTEREST",
        }
    }
}

impl FromStr for CashFlowKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEPOSIT" => Ok(CashFlowKind::Deposit),
            "WITHDRAW" => Ok(CashFlowKind::Withdraw),
            "TRANSFER" => Ok(CashFlowKind::Transfer),
            "INTEREST" => Ok(CashFlowKind::Interest),
            _ => Err(anyhow!("Unknown cash flow kind '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub currency: String,
    /// Derived by replay; any stored value is ignored on input.
    #[serde(default)]
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub ticker: String,
    pub market: Market,
    pub kind: TransactionKind,
    pub price: Decimal,
    pub quantity: Decimal,
    #[serde(default)]
    pub fees: Decimal,
    pub account_id: String,
    /// Settled cash amount in the account's currency, when the broker reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlow {
    pub id: i64,
    pub date: NaiveDate,
    pub kind: CashFlowKind,
    pub amount: Decimal,
    /// Exact amount in the reporting currency; authoritative when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_reporting: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl CashFlow {
    pub fn fee_or_zero(&self) -> Decimal {
        self.fee.unwrap_or(Decimal::ZERO)
    }
}

/// Live quote detail supplied alongside the price map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceDetail {
    #[serde(default)]
    pub change: Decimal,
    #[serde(default)]
    pub change_percent: Decimal,
}

/// Stored year-end data. Prices are keyed by `MARKET-TICKER` or bare ticker;
/// rates are reporting-currency units per one unit of each currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalYear {
    #[serde(default)]
    pub prices: std::collections::BTreeMap<String, Decimal>,
    #[serde(default)]
    pub exchange_rates: std::collections::BTreeMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_assets: Option<Decimal>,
}

/// Reporting view of one lot (or of several lots merged by market and ticker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// `None` once merged across accounts.
    pub account_id: Option<String>,
    pub market: Market,
    pub ticker: String,
    pub currency: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub current_price: Decimal,
    pub total_cost: Decimal,
    pub current_value: Decimal,
    pub unrealized_pl: Decimal,
    pub unrealized_pl_percent: Decimal,
    pub realized_pl: Decimal,
    pub day_change: Decimal,
    pub day_change_percent: Decimal,
    pub weight: Decimal,
    pub annualized_return: Decimal,
    pub opened_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataPoint {
    pub year: i32,
    pub date: NaiveDate,
    pub cumulative_cost: Decimal,
    pub cumulative_profit: Decimal,
    pub total_assets: Decimal,
    pub is_real_data: bool,
    pub cost_ratio: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualPerformanceItem {
    pub year: i32,
    pub start_assets: Decimal,
    pub net_inflow: Decimal,
    pub end_assets: Decimal,
    pub profit: Decimal,
    pub roi: Decimal,
    pub is_real_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPerformance {
    pub account_id: String,
    pub name: String,
    pub currency: String,
    pub cash_native: Decimal,
    pub cash: Decimal,
    pub market_value: Decimal,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub unrealized_pl: Decimal,
    pub unrealized_pl_percent: Decimal,
    pub dividends: Decimal,
    pub weight: Decimal,
    pub annualized_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocationItem {
    pub key: String,
    pub market: Option<Market>,
    pub value: Decimal,
    pub percentage: Decimal,
}

pub const CASH_BUCKET: &str = "CASH";
