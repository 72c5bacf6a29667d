//! Currency rounding and display formatting.
//!
//! All monetary arithmetic in the crate goes through [`round_money`] so the line, subtotal, tax
//! and total steps share one rounding rule: two decimal places, midpoints rounded away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places stored for every monetary amount.
pub const MONEY_PRECISION: u32 = 2;

/// Rounds `amount` to [`MONEY_PRECISION`] places, resolving `.005` ties away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Display conventions for a single currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CurrencyFormat {
    /// Symbol printed in front of the amount.
    pub symbol: String,
    /// Label appended after the amount, e.g. `COP`.
    pub label: String,
    /// Decimal places shown in the document (0 or 2).
    pub decimals: u32,
    pub thousands_separator: char,
    pub decimal_separator: char,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_owned(),
            label: "COP".to_owned(),
            decimals: 0,
            thousands_separator: ',',
            decimal_separator: '.',
        }
    }
}

impl CurrencyFormat {
    /// Formats `amount` as `{symbol}{grouped digits}[.{fraction}] {label}`.
    ///
    /// ```
    /// use invoice_pdf::money::CurrencyFormat;
    /// use rust_decimal::Decimal;
    ///
    /// let cop = CurrencyFormat::default();
    /// assert_eq!(cop.format(Decimal::new(29750000, 2)), "$297,500 COP");
    /// ```
    pub fn format(&self, amount: Decimal) -> String {
        let mut rounded =
            amount.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(self.decimals);

        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let digits = rounded.abs().to_string();
        let (integer, fraction) = match digits.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (digits.as_str(), None),
        };

        let mut out = String::with_capacity(digits.len() + self.label.len() + 8);
        if negative {
            out.push('-');
        }
        out.push_str(&self.symbol);
        out.push_str(&group_thousands(integer, self.thousands_separator));
        if let Some(fraction) = fraction {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        if !self.label.is_empty() {
            out.push(' ');
            out.push_str(&self.label);
        }
        out
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (len - index) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped
}

/// Renders a tax rate such as `0.19` as `19%`.
pub fn format_rate(rate: Decimal) -> String {
    let percent = (rate * Decimal::ONE_HUNDRED).normalize();
    format!("{percent}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_ties_away_from_zero() {
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn formats_whole_currency_with_grouping() {
        let cop = CurrencyFormat::default();
        assert_eq!(cop.format(dec!(250000.00)), "$250,000 COP");
        assert_eq!(cop.format(dec!(999.50)), "$1,000 COP");
        assert_eq!(cop.format(dec!(0)), "$0 COP");
        assert_eq!(cop.format(dec!(1234567)), "$1,234,567 COP");
    }

    #[test]
    fn formats_two_decimals() {
        let usd = CurrencyFormat {
            label: "USD".to_owned(),
            decimals: 2,
            ..CurrencyFormat::default()
        };
        assert_eq!(usd.format(dec!(47500)), "$47,500.00 USD");
        assert_eq!(usd.format(dec!(12.3)), "$12.30 USD");
        assert_eq!(usd.format(dec!(-1000.456)), "-$1,000.46 USD");
    }

    #[test]
    fn european_separators() {
        let eur = CurrencyFormat {
            symbol: String::new(),
            label: "EUR".to_owned(),
            decimals: 2,
            thousands_separator: '.',
            decimal_separator: ',',
        };
        assert_eq!(eur.format(dec!(1234.5)), "1.234,50 EUR");
    }

    #[test]
    fn rate_label() {
        assert_eq!(format_rate(dec!(0.19)), "19%");
        assert_eq!(format_rate(dec!(0.155)), "15.5%");
        assert_eq!(format_rate(dec!(0)), "0%");
    }
}
