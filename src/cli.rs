// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, command};

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
}

fn output_flags(cmd: Command) -> Command {
    cmd.arg(flag("json", "Print as pretty JSON"))
        .arg(flag("jsonl", "Print as JSON lines").conflicts_with("json"))
}

fn account_cmd() -> Command {
    Command::new("account")
        .about("Manage accounts")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add an account")
                .arg(req("id", "Stable account id, e.g. broker-us"))
                .arg(req("name", "Display name"))
                .arg(req("currency", "Account currency, e.g. USD")),
        )
        .subcommand(output_flags(
            Command::new("list").about("List accounts with replayed cash balances"),
        ))
        .subcommand(
            Command::new("rm")
                .about("Remove an account")
                .arg(req("id", "Account id")),
        )
}

fn trade_cmd() -> Command {
    Command::new("trade")
        .about("Record security transactions")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a transaction")
                .arg(req(
                    "kind",
                    "buy|sell|stock-dividend|cash-dividend|transfer-in|transfer-out",
                ))
                .arg(req("date", "YYYY-MM-DD"))
                .arg(req("account", "Account id"))
                .arg(req("market", "TW|US|JP|HK|UK"))
                .arg(req("ticker", "Ticker symbol"))
                .arg(req("quantity", "Shares"))
                .arg(req("price", "Price per share in the market currency"))
                .arg(opt("fees", "Fees in the market currency").default_value("0"))
                .arg(opt("total", "Settled cash amount in the account currency")),
        )
        .subcommand(output_flags(Command::new("list").about("List transactions")))
}

fn cash_cmd() -> Command {
    Command::new("cash")
        .about("Record cash flows")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add a cash flow")
                .arg(req("kind", "deposit|withdraw|transfer|interest"))
                .arg(req("date", "YYYY-MM-DD"))
                .arg(req("account", "Account id"))
                .arg(req("amount", "Amount in the account currency"))
                .arg(opt("to", "Target account id (transfer)"))
                .arg(opt("rate", "Stated exchange rate"))
                .arg(opt("fee", "Fee in the account currency"))
                .arg(opt(
                    "reporting-amount",
                    "Exact amount in the reporting currency",
                ))
                .arg(opt("category", "Free-form category")),
        )
        .subcommand(output_flags(Command::new("list").about("List cash flows")))
}

fn price_cmd() -> Command {
    Command::new("price")
        .about("Maintain live prices")
        .subcommand_required(true)
        .subcommand(
            Command::new("set")
                .about("Set the live price of a security")
                .arg(req("market", "TW|US|JP|HK|UK"))
                .arg(req("ticker", "Ticker symbol"))
                .arg(req("price", "Price in the market currency"))
                .arg(opt("change", "Day change per share"))
                .arg(opt("change-percent", "Day change in percent")),
        )
        .subcommand(output_flags(Command::new("list").about("List live prices")))
}

fn fx_cmd() -> Command {
    Command::new("fx")
        .about("Maintain live exchange rates")
        .subcommand_required(true)
        .subcommand(
            Command::new("set")
                .about("Set reporting-currency units per one unit of a currency")
                .arg(req("currency", "Currency code"))
                .arg(req("rate", "Rate")),
        )
        .subcommand(output_flags(Command::new("list").about("List live rates")))
        .subcommand(
            Command::new("base")
                .about("Set the reporting currency")
                .arg(req("currency", "Currency code")),
        )
}

fn history_cmd() -> Command {
    Command::new("history")
        .about("Maintain year-end data")
        .subcommand_required(true)
        .subcommand(
            Command::new("price")
                .about("Set a year-end price")
                .arg(req("year", "Calendar year").value_parser(clap::value_parser!(i32)))
                .arg(req("market", "TW|US|JP|HK|UK"))
                .arg(req("ticker", "Ticker symbol"))
                .arg(req("price", "Closing price")),
        )
        .subcommand(
            Command::new("rate")
                .about("Set a year-end exchange rate")
                .arg(req("year", "Calendar year").value_parser(clap::value_parser!(i32)))
                .arg(req("currency", "Currency code"))
                .arg(req("rate", "Reporting units per one unit")),
        )
        .subcommand(
            Command::new("total")
                .about("Record a known total-assets snapshot for a year")
                .arg(req("year", "Calendar year").value_parser(clap::value_parser!(i32)))
                .arg(req("amount", "Total assets in the reporting currency")),
        )
        .subcommand(output_flags(Command::new("list").about("List year-end data")))
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Valuation reports")
        .subcommand_required(true)
        .subcommand(output_flags(
            Command::new("holdings")
                .about("Open positions at live prices")
                .arg(flag("merge", "Merge lots across accounts")),
        ))
        .subcommand(output_flags(
            Command::new("lots")
                .about("Replayed lots without valuation")
                .arg(opt("as-of", "Replay events up to YYYY-MM-DD")),
        ))
        .subcommand(output_flags(
            Command::new("accounts").about("Per-account performance"),
        ))
        .subcommand(output_flags(
            Command::new("chart").about("Year-by-year cost and total assets"),
        ))
        .subcommand(output_flags(
            Command::new("annual").about("Year-over-year performance"),
        ))
        .subcommand(output_flags(
            Command::new("allocation").about("Allocation by security and cash"),
        ))
        .subcommand(output_flags(
            Command::new("summary").about("Portfolio totals and annualized return"),
        ))
}

pub fn build_cli() -> Command {
    command!()
        .name("portfold")
        .about("Ledger replay and valuation for multi-market portfolios")
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(account_cmd())
        .subcommand(trade_cmd())
        .subcommand(cash_cmd())
        .subcommand(price_cmd())
        .subcommand(fx_cmd())
        .subcommand(history_cmd())
        .subcommand(report_cmd())
        .subcommand(
            Command::new("import")
                .about("Replace the ledger with a JSON document")
                .arg(req("path", "Path to the document")),
        )
        .subcommand(
            Command::new("export")
                .about("Write the ledger to a file")
                .arg(req("path", "Output path"))
                .arg(
                    opt("format", "json (document) or csv (transactions)")
                        .value_parser(["json", "csv"])
                        .default_value("json"),
                ),
        )
        .subcommand(Command::new("doctor").about("Check the ledger for problems"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }
}
