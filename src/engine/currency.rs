// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::HistoricalYear;
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Currency code -> reporting-currency units per one unit of that currency.
pub type RateTable = BTreeMap<String, Decimal>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// Live rate from the price oracle.
    Current,
    /// Stored year-end rate for the given year.
    Historical(i32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub value: Decimal,
    /// True when the preferred source had no rate and a fallback answered.
    pub estimated: bool,
}

impl Rate {
    fn exact(value: Decimal) -> Self {
        Rate {
            value,
            estimated: false,
        }
    }

    fn fallback(value: Decimal) -> Self {
        Rate {
            value,
            estimated: true,
        }
    }
}

/// Converts native amounts into the reporting currency.
///
/// Lookup order for `Current`: live rate, then the latest stored year-end rate.
/// For `Historical(year)`: that year's rate, the live rate, then the nearest
/// earlier year-end rate. With nothing available the rate is 0 and flagged
/// as estimated; a rate from another currency is never substituted.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyNormalizer<'a> {
    reporting: &'a str,
    current: &'a RateTable,
    historical: &'a BTreeMap<i32, HistoricalYear>,
}

fn usable(rate: Option<&Decimal>) -> Option<Decimal> {
    rate.copied().filter(|r| *r > Decimal::ZERO)
}

impl<'a> CurrencyNormalizer<'a> {
    pub fn new(
        reporting: &'a str,
        current: &'a RateTable,
        historical: &'a BTreeMap<i32, HistoricalYear>,
    ) -> Self {
        Self {
            reporting,
            current,
            historical,
        }
    }

    pub fn is_reporting(&self, currency: &str) -> bool {
        currency.trim().eq_ignore_ascii_case(self.reporting)
    }

    pub fn rate(&self, currency: &str, source: RateSource) -> Rate {
        if self.is_reporting(currency) {
            return Rate::exact(Decimal::ONE);
        }
        let code = currency.trim().to_uppercase();

        let found = match source {
            RateSource::Current => usable(self.current.get(&code))
                .map(Rate::exact)
                .or_else(|| self.latest_year_end(&code, None).map(Rate::fallback)),
            RateSource::Historical(year) => self
                .historical
                .get(&year)
                .and_then(|y| usable(y.exchange_rates.get(&code)))
                .map(Rate::exact)
                .or_else(|| usable(self.current.get(&code)).map(Rate::fallback))
                .or_else(|| self.latest_year_end(&code, Some(year)).map(Rate::fallback)),
        };

        found.unwrap_or_else(|| {
            debug!(
                "No {}/{} rate for {:?}; defaulting to 0",
                code, self.reporting, source
            );
            Rate::fallback(Decimal::ZERO)
        })
    }

    fn latest_year_end(&self, code: &str, before: Option<i32>) -> Option<Decimal> {
        let upper = before.unwrap_or(i32::MAX);
        self.historical
            .range(..upper)
            .rev()
            .find_map(|(_, y)| usable(y.exchange_rates.get(code)))
    }

    pub fn convert(&self, amount: Decimal, currency: &str, source: RateSource) -> Decimal {
        self.convert_flagged(amount, currency, source).0
    }

    /// Returns the converted amount and whether the rate was estimated.
    pub fn convert_flagged(
        &self,
        amount: Decimal,
        currency: &str,
        source: RateSource,
    ) -> (Decimal, bool) {
        if amount.is_zero() {
            return (Decimal::ZERO, false);
        }
        let rate = self.rate(currency, source);
        (amount * rate.value, rate.estimated)
    }

    /// Converts between two native currencies through the reporting currency.
    pub fn convert_between(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        source: RateSource,
    ) -> Decimal {
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return amount;
        }
        let to_rate = self.rate(to, source).value;
        if to_rate.is_zero() {
            return Decimal::ZERO;
        }
        amount * self.rate(from, source).value / to_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn tables() -> (RateTable, BTreeMap<i32, HistoricalYear>) {
        let mut current = RateTable::new();
        current.insert("USD".into(), d("32"));
        let mut historical = BTreeMap::new();
        let mut y2022 = HistoricalYear::default();
        y2022.exchange_rates.insert("USD".into(), d("30.7"));
        y2022.exchange_rates.insert("JPY".into(), d("0.23"));
        historical.insert(2022, y2022);
        (current, historical)
    }

    #[test]
    fn reporting_currency_is_identity() {
        let (current, historical) = tables();
        let fx = CurrencyNormalizer::new("TWD", &current, &historical);
        let rate = fx.rate("twd", RateSource::Historical(1999));
        assert_eq!(rate.value, Decimal::ONE);
        assert!(!rate.estimated);
    }

    #[test]
    fn historical_prefers_year_end_then_current() {
        let (current, historical) = tables();
        let fx = CurrencyNormalizer::new("TWD", &current, &historical);

        let exact = fx.rate("USD", RateSource::Historical(2022));
        assert_eq!(exact.value, d("30.7"));
        assert!(!exact.estimated);

        let fallback = fx.rate("USD", RateSource::Historical(2023));
        assert_eq!(fallback.value, d("32"));
        assert!(fallback.estimated);
    }

    #[test]
    fn missing_current_rate_uses_last_year_end_not_another_currency() {
        let (current, historical) = tables();
        let fx = CurrencyNormalizer::new("TWD", &current, &historical);

        let jpy = fx.rate("JPY", RateSource::Current);
        assert_eq!(jpy.value, d("0.23"));
        assert!(jpy.estimated);

        let gbp = fx.rate("GBP", RateSource::Current);
        assert_eq!(gbp.value, Decimal::ZERO);
        assert!(gbp.estimated);
    }

    #[test]
    fn convert_between_routes_through_reporting() {
        let (current, historical) = tables();
        let fx = CurrencyNormalizer::new("TWD", &current, &historical);
        let usd = fx.convert_between(d("1000"), "TWD", "USD", RateSource::Current);
        assert_eq!(usd, d("31.25"));
    }
}
