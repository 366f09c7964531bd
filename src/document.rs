// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The portable JSON ledger: everything the engine needs in one snapshot.

use crate::engine::currency::{CurrencyNormalizer, RateTable};
use crate::engine::valuation::MarketData;
use crate::models::{Account, CashFlow, CashFlowKind, HistoricalYear, PriceDetail, Transaction};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

pub const DOCUMENT_VERSION: u32 = 1;
pub const DEFAULT_REPORTING_CURRENCY: &str = "TWD";

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

fn default_reporting_currency() -> String {
    DEFAULT_REPORTING_CURRENCY.to_string()
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed ledger document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("ledger document is missing the required '{0}' array")]
    MissingArray(&'static str),
    #[error("duplicate {stream} id {id}")]
    DuplicateId { stream: &'static str, id: String },
    #[error("cash flow {0} is a TRANSFER without a target account")]
    TransferWithoutTarget(i64),
    #[error("cash flow {0} transfers into its own account")]
    SelfTransfer(i64),
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_reporting_currency")]
    pub reporting_currency: String,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub cash_flows: Vec<CashFlow>,
    /// Live rates: reporting units per one unit of each currency.
    #[serde(default)]
    pub exchange_rates: RateTable,
    /// Live prices keyed by `MARKET-TICKER`.
    #[serde(default)]
    pub prices: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub price_details: BTreeMap<String, PriceDetail>,
    #[serde(default)]
    pub historical_data: BTreeMap<i32, HistoricalYear>,
}

impl Default for LedgerDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            reporting_currency: default_reporting_currency(),
            accounts: Vec::new(),
            transactions: Vec::new(),
            cash_flows: Vec::new(),
            exchange_rates: RateTable::new(),
            prices: BTreeMap::new(),
            price_details: BTreeMap::new(),
            historical_data: BTreeMap::new(),
        }
    }
}

impl LedgerDocument {
    pub fn normalizer(&self) -> CurrencyNormalizer<'_> {
        CurrencyNormalizer::new(
            &self.reporting_currency,
            &self.exchange_rates,
            &self.historical_data,
        )
    }

    pub fn market_data(&self) -> MarketData {
        MarketData {
            prices: self.prices.clone(),
            details: self.price_details.clone(),
        }
    }

    /// Account id -> account currency.
    pub fn account_currencies(&self) -> BTreeMap<String, String> {
        self.accounts
            .iter()
            .map(|a| (a.id.clone(), a.currency.clone()))
            .collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Structural checks shared by import and the storage shell.
    pub fn validate(&self) -> Result<(), ImportError> {
        if !is_currency_code(&self.reporting_currency) {
            return Err(ImportError::InvalidCurrency(self.reporting_currency.clone()));
        }

        let mut account_ids = HashSet::new();
        for account in &self.accounts {
            if !is_currency_code(&account.currency) {
                return Err(ImportError::InvalidCurrency(account.currency.clone()));
            }
            if !account_ids.insert(account.id.as_str()) {
                return Err(ImportError::DuplicateId {
                    stream: "account",
                    id: account.id.clone(),
                });
            }
        }

        let mut tx_ids = HashSet::new();
        for tx in &self.transactions {
            if !tx_ids.insert(tx.id) {
                return Err(ImportError::DuplicateId {
                    stream: "transaction",
                    id: tx.id.to_string(),
                });
            }
        }

        let mut flow_ids = HashSet::new();
        for flow in &self.cash_flows {
            if !flow_ids.insert(flow.id) {
                return Err(ImportError::DuplicateId {
                    stream: "cash flow",
                    id: flow.id.to_string(),
                });
            }
            if flow.kind == CashFlowKind::Transfer {
                match flow.target_account_id.as_deref() {
                    None | Some("") => return Err(ImportError::TransferWithoutTarget(flow.id)),
                    Some(target) if target == flow.account_id => {
                        return Err(ImportError::SelfTransfer(flow.id));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Parses and validates a ledger document. Nothing is partially accepted.
pub fn parse_document(input: &str) -> Result<LedgerDocument, ImportError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    for required in ["accounts", "transactions"] {
        if !value.get(required).is_some_and(|v| v.is_array()) {
            return Err(ImportError::MissingArray(required));
        }
    }
    let doc: LedgerDocument = serde_json::from_value(value)?;
    doc.validate()?;
    Ok(doc)
}
