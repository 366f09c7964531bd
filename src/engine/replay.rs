// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Folds transactions and cash flows, in a fixed total order, into per-lot
//! cost basis and per-account cash balances.

use crate::engine::cost_basis::Lot;
use crate::engine::currency::{CurrencyNormalizer, RateSource};
use crate::models::{
    Account, CashFlow, CashFlowKind, Market, Transaction, TransactionKind, price_key,
};
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LotKey {
    pub account_id: String,
    pub market: Market,
    pub ticker: String,
}

impl LotKey {
    pub fn new(account_id: &str, market: Market, ticker: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            market,
            ticker: ticker.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventRef {
    Transaction(i64),
    CashFlow(i64),
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRef::Transaction(id) => write!(f, "tx#{}", id),
            EventRef::CashFlow(id) => write!(f, "cf#{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    Oversold,
    OrphanAccount,
    InvalidEvent,
    UnpairedTransfer,
}

/// A data-entry problem replay recovered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayWarning {
    pub event: EventRef,
    pub account_id: String,
    pub date: NaiveDate,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for ReplayWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (account: {}, date: {}): {}",
            self.event, self.account_id, self.date, self.message
        )
    }
}

/// Shares moved between accounts by a paired transfer, with the cost they
/// carried in the market currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityTransfer {
    pub date: NaiveDate,
    pub from_account: String,
    pub to_account: String,
    pub market: Market,
    pub ticker: String,
    pub quantity: Decimal,
    pub cost: Decimal,
}

/// Derived ledger state as of `as_of` (or of the last event when unbounded).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerState {
    pub as_of: Option<NaiveDate>,
    pub lots: BTreeMap<LotKey, Lot>,
    /// Native-currency cash per known account.
    pub cash: BTreeMap<String, Decimal>,
    /// Native-currency cash dividends per account.
    pub dividends: BTreeMap<String, Decimal>,
    /// Last BUY/SELL price per `MARKET-TICKER`, used to hold prices forward.
    pub last_trade_prices: BTreeMap<String, Decimal>,
    pub security_transfers: Vec<SecurityTransfer>,
    pub warnings: Vec<ReplayWarning>,
}

impl LedgerState {
    pub fn open_lots(&self) -> impl Iterator<Item = (&LotKey, &Lot)> {
        self.lots.iter().filter(|(_, lot)| lot.is_open())
    }

    pub fn cash_of(&self, account_id: &str) -> Decimal {
        self.cash.get(account_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Accounts with `balance` filled from replayed cash.
    pub fn accounts_with_balances(&self, accounts: &[Account]) -> Vec<Account> {
        accounts
            .iter()
            .map(|a| Account {
                balance: self.cash_of(&a.id),
                ..a.clone()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Event<'a> {
    Flow(&'a CashFlow),
    Tx(&'a Transaction),
}

impl Event<'_> {
    fn date(&self) -> NaiveDate {
        match self {
            Event::Flow(f) => f.date,
            Event::Tx(t) => t.date,
        }
    }

    /// Same-day order: inbound cash, income, sells, buys, outbound cash.
    fn priority(&self) -> u8 {
        match self {
            Event::Flow(f) => match f.kind {
                CashFlowKind::Deposit | CashFlowKind::Interest => 0,
                CashFlowKind::Withdraw | CashFlowKind::Transfer => 4,
            },
            Event::Tx(t) => match t.kind {
                TransactionKind::TransferIn => 0,
                TransactionKind::CashDividend | TransactionKind::StockDividend => 1,
                TransactionKind::Sell => 2,
                TransactionKind::Buy => 3,
                TransactionKind::TransferOut => 4,
            },
        }
    }

    fn reference(&self) -> EventRef {
        match self {
            Event::Flow(f) => EventRef::CashFlow(f.id),
            Event::Tx(t) => EventRef::Transaction(t.id),
        }
    }

    fn sort_key(&self) -> (NaiveDate, u8, i64, u8) {
        match self {
            Event::Flow(f) => (f.date, self.priority(), f.id, 0),
            Event::Tx(t) => (t.date, self.priority(), t.id, 1),
        }
    }

    fn account_id(&self) -> &str {
        match self {
            Event::Flow(f) => &f.account_id,
            Event::Tx(t) => &t.account_id,
        }
    }
}

/// Merges both streams into the replay order, dropping events after `cutoff`.
fn ordered_events<'a>(
    transactions: &'a [Transaction],
    cash_flows: &'a [CashFlow],
    cutoff: Option<NaiveDate>,
) -> Vec<Event<'a>> {
    let within = |date: NaiveDate| cutoff.is_none_or(|c| date <= c);
    let mut events: Vec<Event<'a>> = cash_flows
        .iter()
        .filter(|f| within(f.date))
        .map(Event::Flow)
        .chain(
            transactions
                .iter()
                .filter(|t| within(t.date))
                .map(Event::Tx),
        )
        .collect();
    events.sort_by_key(|e| e.sort_key());
    events
}

fn transaction_problem(tx: &Transaction) -> Option<String> {
    if tx.ticker.trim().is_empty() {
        return Some("empty ticker".into());
    }
    if tx.price < Decimal::ZERO || tx.quantity < Decimal::ZERO || tx.fees < Decimal::ZERO {
        return Some(format!(
            "negative price/quantity/fees ({} x {} fees {})",
            tx.quantity, tx.price, tx.fees
        ));
    }
    if tx.total_amount.is_some_and(|t| t < Decimal::ZERO) {
        return Some("negative total amount".into());
    }
    let needs_quantity = !matches!(tx.kind, TransactionKind::CashDividend);
    if needs_quantity && tx.quantity.is_zero() {
        return Some(format!("{} with zero quantity", tx.kind.as_str()));
    }
    None
}

pub(crate) fn flow_problem(flow: &CashFlow) -> Option<String> {
    if flow.amount < Decimal::ZERO {
        return Some(format!("negative amount {}", flow.amount));
    }
    if flow.fee.is_some_and(|f| f < Decimal::ZERO) {
        return Some("negative fee".into());
    }
    if flow.exchange_rate.is_some_and(|r| r <= Decimal::ZERO) {
        return Some("non-positive exchange rate".into());
    }
    if flow.kind == CashFlowKind::Transfer {
        match flow.target_account_id.as_deref() {
            None => return Some("transfer without target account".into()),
            Some(t) if t == flow.account_id => {
                return Some("transfer targets its own account".into());
            }
            _ => {}
        }
    }
    None
}

/// Security transfers matched across accounts. A paired TRANSFER_IN is
/// applied together with its TRANSFER_OUT, so it carries exactly the cost
/// the OUT removed.
#[derive(Default)]
struct TransferPairs<'a> {
    inbound_for_out: HashMap<i64, &'a Transaction>,
    paired: HashSet<i64>,
}

/// Pairs each TRANSFER_IN with the first unmatched TRANSFER_OUT of the same
/// market, ticker, date and quantity held in a different account.
fn pair_security_transfers<'a>(events: &[Event<'a>]) -> TransferPairs<'a> {
    let mut outs: Vec<(&'a Transaction, bool)> = events
        .iter()
        .filter_map(|e| match e {
            Event::Tx(t) if t.kind == TransactionKind::TransferOut => Some((*t, false)),
            _ => None,
        })
        .collect();

    let mut pairs = TransferPairs::default();
    for event in events {
        let Event::Tx(tin) = event else { continue };
        if tin.kind != TransactionKind::TransferIn {
            continue;
        }
        let matched = outs.iter_mut().find(|(out, used)| {
            !*used
                && out.market == tin.market
                && out.ticker == tin.ticker
                && out.date == tin.date
                && out.quantity == tin.quantity
                && out.account_id != tin.account_id
        });
        if let Some((out, used)) = matched {
            *used = true;
            pairs.inbound_for_out.insert(out.id, *tin);
            pairs.paired.insert(out.id);
            pairs.paired.insert(tin.id);
        }
    }
    pairs
}

struct Replayer<'a> {
    fx: &'a CurrencyNormalizer<'a>,
    currencies: HashMap<&'a str, &'a str>,
    transfer_pairs: TransferPairs<'a>,
    state: LedgerState,
}

impl<'a> Replayer<'a> {
    fn warn(
        &mut self,
        event: EventRef,
        account_id: &str,
        date: NaiveDate,
        kind: WarningKind,
        message: String,
    ) {
        let warning = ReplayWarning {
            event,
            account_id: account_id.to_string(),
            date,
            kind,
            message,
        };
        if kind == WarningKind::UnpairedTransfer {
            debug!("{}", warning);
        } else {
            warn!("{}", warning);
        }
        self.state.warnings.push(warning);
    }

    fn credit(&mut self, account_id: &str, amount: Decimal) {
        *self
            .state
            .cash
            .entry(account_id.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    fn lot(&mut self, account_id: &str, market: Market, ticker: &str) -> &mut Lot {
        self.state
            .lots
            .entry(LotKey::new(account_id, market, ticker))
            .or_default()
    }

    fn apply_flow(&mut self, flow: &CashFlow) {
        let fee = flow.fee_or_zero();
        match flow.kind {
            CashFlowKind::Deposit => self.credit(&flow.account_id, flow.amount - fee),
            CashFlowKind::Interest => self.credit(&flow.account_id, flow.amount),
            CashFlowKind::Withdraw => self.credit(&flow.account_id, -(flow.amount + fee)),
            CashFlowKind::Transfer => {
                let Some(target) = flow.target_account_id.as_deref() else {
                    return;
                };
                let credited = self.transfer_credit(flow, target);
                self.credit(&flow.account_id, -(flow.amount + fee));
                self.credit(target, credited);
            }
        }
    }

    /// Native amount credited at the target of a cash transfer.
    fn transfer_credit(&self, flow: &CashFlow, target: &str) -> Decimal {
        let from = self.currencies.get(flow.account_id.as_str()).copied().unwrap_or_default();
        let to = self.currencies.get(target).copied().unwrap_or_default();
        if from.eq_ignore_ascii_case(to) {
            return flow.amount;
        }
        match flow.exchange_rate {
            Some(rate) if self.fx.is_reporting(from) => flow.amount / rate,
            Some(rate) if self.fx.is_reporting(to) => flow.amount * rate,
            Some(rate) => flow.amount / rate,
            None => self.fx.convert_between(
                flow.amount,
                from,
                to,
                RateSource::Historical(flow.date.year()),
            ),
        }
    }

    fn apply_transaction(&mut self, tx: &Transaction) {
        let gross = tx.price * tx.quantity;
        let key = price_key(tx.market, &tx.ticker);
        let reference = EventRef::Transaction(tx.id);

        match tx.kind {
            TransactionKind::Buy => {
                let cost = gross + tx.fees;
                self.lot(&tx.account_id, tx.market, &tx.ticker)
                    .acquire(tx.quantity, cost, tx.date);
                self.credit(&tx.account_id, -tx.total_amount.unwrap_or(cost));
                self.state.last_trade_prices.insert(key, tx.price);
            }
            TransactionKind::Sell => {
                let proceeds = gross - tx.fees;
                let disposal = self
                    .lot(&tx.account_id, tx.market, &tx.ticker)
                    .sell(tx.quantity, proceeds);
                if disposal.is_clamped() {
                    self.warn(
                        reference,
                        &tx.account_id,
                        tx.date,
                        WarningKind::Oversold,
                        format!(
                            "sell of {} {} exceeds held quantity by {}; clamped to zero",
                            tx.quantity, key, disposal.shortfall
                        ),
                    );
                }
                self.credit(&tx.account_id, tx.total_amount.unwrap_or(proceeds));
                self.state.last_trade_prices.insert(key, tx.price);
            }
            TransactionKind::StockDividend => {
                let cost = tx.total_amount.unwrap_or(gross);
                self.lot(&tx.account_id, tx.market, &tx.ticker)
                    .acquire(tx.quantity, cost, tx.date);
                self.credit(&tx.account_id, -tx.fees);
            }
            TransactionKind::CashDividend => {
                let amount = tx.total_amount.unwrap_or(gross) - tx.fees;
                self.credit(&tx.account_id, amount);
                *self
                    .state
                    .dividends
                    .entry(tx.account_id.clone())
                    .or_insert(Decimal::ZERO) += amount;
            }
            TransactionKind::TransferIn => {
                if self.transfer_pairs.paired.contains(&tx.id) {
                    return;
                }
                self.warn(
                    reference,
                    &tx.account_id,
                    tx.date,
                    WarningKind::UnpairedTransfer,
                    format!("inbound {} has no matching TRANSFER_OUT", key),
                );
                self.receive(tx, tx.total_amount.unwrap_or(gross));
            }
            TransactionKind::TransferOut => {
                if !self.transfer_pairs.paired.contains(&tx.id) {
                    self.warn(
                        reference,
                        &tx.account_id,
                        tx.date,
                        WarningKind::UnpairedTransfer,
                        format!("outbound {} has no matching TRANSFER_IN", key),
                    );
                }
                let disposal = self
                    .lot(&tx.account_id, tx.market, &tx.ticker)
                    .dispose(tx.quantity);
                if disposal.is_clamped() {
                    self.warn(
                        reference,
                        &tx.account_id,
                        tx.date,
                        WarningKind::Oversold,
                        format!(
                            "transfer of {} {} exceeds held quantity by {}; clamped to zero",
                            tx.quantity, key, disposal.shortfall
                        ),
                    );
                }
                self.credit(&tx.account_id, -tx.fees);
                if let Some(inbound) = self.transfer_pairs.inbound_for_out.get(&tx.id).copied() {
                    self.receive(inbound, disposal.cost);
                    self.state.security_transfers.push(SecurityTransfer {
                        date: tx.date,
                        from_account: tx.account_id.clone(),
                        to_account: inbound.account_id.clone(),
                        market: tx.market,
                        ticker: tx.ticker.clone(),
                        quantity: inbound.quantity,
                        cost: disposal.cost,
                    });
                }
            }
        }
    }

    /// Books an inbound security transfer carrying `cost` into its lot.
    fn receive(&mut self, tx: &Transaction, cost: Decimal) {
        self.lot(&tx.account_id, tx.market, &tx.ticker)
            .acquire(tx.quantity, cost, tx.date);
        self.credit(&tx.account_id, -tx.fees);
    }
}

/// Replays every event dated on or before `cutoff` (all events when `None`).
///
/// Events naming an unknown account, or carrying negative amounts, are left
/// out of the state and reported in `warnings`; replay itself never fails.
pub fn replay(
    accounts: &[Account],
    transactions: &[Transaction],
    cash_flows: &[CashFlow],
    fx: &CurrencyNormalizer<'_>,
    cutoff: Option<NaiveDate>,
) -> LedgerState {
    let known: HashSet<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
    let mut state = LedgerState {
        as_of: cutoff,
        ..LedgerState::default()
    };
    for account in accounts {
        state.cash.insert(account.id.clone(), Decimal::ZERO);
    }

    let mut accepted = Vec::new();
    for event in ordered_events(transactions, cash_flows, cutoff) {
        let mut problem = match event {
            Event::Flow(f) => flow_problem(f),
            Event::Tx(t) => transaction_problem(t),
        }
        .map(|p| (WarningKind::InvalidEvent, p));

        if problem.is_none() {
            let mut missing = vec![event.account_id()];
            if let Event::Flow(f) = event {
                missing.extend(f.target_account_id.as_deref());
            }
            missing.retain(|id| !known.contains(id));
            if !missing.is_empty() {
                problem = Some((
                    WarningKind::OrphanAccount,
                    format!("unknown account {}; excluded from balances", missing.join(", ")),
                ));
            }
        }

        match problem {
            Some((kind, message)) => {
                let warning = ReplayWarning {
                    event: event.reference(),
                    account_id: event.account_id().to_string(),
                    date: event.date(),
                    kind,
                    message,
                };
                warn!("{}", warning);
                state.warnings.push(warning);
            }
            None => accepted.push(event),
        }
    }

    let mut replayer = Replayer {
        fx,
        currencies: accounts
            .iter()
            .map(|a| (a.id.as_str(), a.currency.as_str()))
            .collect(),
        transfer_pairs: pair_security_transfers(&accepted),
        state,
    };

    debug!(
        "Replaying {} events (cutoff {:?})",
        accepted.len(),
        cutoff
    );
    for event in &accepted {
        match event {
            Event::Flow(f) => replayer.apply_flow(f),
            Event::Tx(t) => replayer.apply_transaction(t),
        }
    }

    replayer.state
}
