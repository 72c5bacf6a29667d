//! Process-wide invoice settings.
//!
//! The configuration is loaded once (defaults, then an optional TOML file, then environment
//! overrides) and handed explicitly to the builder, the renderer and the synthetic source.

use std::env;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::money::CurrencyFormat;

/// Default tax rate applied to invoice subtotals.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// Default number of description characters shown in the item table.
pub const DEFAULT_TRUNCATION_BUDGET: usize = 40;

/// Invoice, layout and synthetic-source settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvoiceConfig {
    /// Fraction of the subtotal charged as tax, e.g. `0.19`.
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_rate: Decimal,
    pub currency: CurrencyFormat,
    /// Maximum characters of a description displayed before it is shortened.
    pub truncation_budget: usize,
    pub synthetic: SyntheticRanges,
}

/// Value ranges used by [`SyntheticSource`](crate::source::SyntheticSource).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticRanges {
    pub min_items: usize,
    pub max_items: usize,
    pub min_quantity: u32,
    pub max_quantity: u32,
    /// Lowest unit price, in cents.
    pub min_price_cents: i64,
    /// Highest unit price, in cents.
    pub max_price_cents: i64,
    /// Issue dates fall within this many days before the reference date.
    pub max_age_days: u32,
}

/// Upper bound for [`SyntheticRanges::max_age_days`], roughly ten years.
pub const MAX_SYNTHETIC_AGE_DAYS: u32 = 3650;

impl Default for SyntheticRanges {
    fn default() -> Self {
        Self {
            min_items: 1,
            max_items: 5,
            min_quantity: 1,
            max_quantity: 10,
            min_price_cents: 10_00,
            max_price_cents: 500_00,
            max_age_days: 30,
        }
    }
}

impl SyntheticRanges {
    pub fn items(&self) -> RangeInclusive<usize> {
        self.min_items..=self.max_items
    }

    pub fn quantity(&self) -> RangeInclusive<u32> {
        self.min_quantity..=self.max_quantity
    }

    pub fn price_cents(&self) -> RangeInclusive<i64> {
        self.min_price_cents..=self.max_price_cents
    }
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            currency: CurrencyFormat::default(),
            truncation_budget: DEFAULT_TRUNCATION_BUDGET,
            synthetic: SyntheticRanges::default(),
        }
    }
}

impl InvoiceConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the TOML file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads the optional file, then applies `INVOICE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `INVOICE_TAX_RATE`, `INVOICE_CURRENCY_LABEL` and `INVOICE_DISPLAY_DECIMALS`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = env::var("INVOICE_TAX_RATE") {
            match Decimal::from_str(raw.trim()) {
                Ok(rate) => self.tax_rate = rate,
                Err(err) => warn!("Ignoring INVOICE_TAX_RATE={raw:?}: {err}"),
            }
        }

        if let Ok(label) = env::var("INVOICE_CURRENCY_LABEL") {
            self.currency.label = label.trim().to_owned();
        }

        if let Ok(raw) = env::var("INVOICE_DISPLAY_DECIMALS") {
            match raw.trim().parse::<u32>() {
                Ok(decimals) => self.currency.decimals = decimals,
                Err(err) => warn!("Ignoring INVOICE_DISPLAY_DECIMALS={raw:?}: {err}"),
            }
        }

        self
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "tax_rate {} must lie between 0 and 1",
                self.tax_rate
            )));
        }
        if !matches!(self.currency.decimals, 0 | 2) {
            return Err(ConfigError::Invalid(format!(
                "currency.decimals must be 0 or 2, got {}",
                self.currency.decimals
            )));
        }
        if self.truncation_budget < 4 {
            return Err(ConfigError::Invalid(format!(
                "truncation_budget {} leaves no room for an ellipsis",
                self.truncation_budget
            )));
        }

        let ranges = &self.synthetic;
        if ranges.min_items == 0 || ranges.min_items > ranges.max_items {
            return Err(ConfigError::Invalid(
                "synthetic item count range must be non-empty and start at 1 or more".to_owned(),
            ));
        }
        if ranges.min_quantity == 0 || ranges.min_quantity > ranges.max_quantity {
            return Err(ConfigError::Invalid(
                "synthetic quantity range must be non-empty and start at 1 or more".to_owned(),
            ));
        }
        if ranges.min_price_cents < 0 || ranges.min_price_cents > ranges.max_price_cents {
            return Err(ConfigError::Invalid(
                "synthetic price range must be non-empty and non-negative".to_owned(),
            ));
        }
        if ranges.max_age_days > MAX_SYNTHETIC_AGE_DAYS {
            return Err(ConfigError::Invalid(format!(
                "synthetic max_age_days {} exceeds {}",
                ranges.max_age_days, MAX_SYNTHETIC_AGE_DAYS
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_documented_values() {
        let config = InvoiceConfig::default();
        assert_eq!(config.tax_rate, dec!(0.19));
        assert_eq!(config.truncation_budget, 40);
        assert_eq!(config.currency.label, "COP");
        assert_eq!(config.synthetic.quantity(), 1..=10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = InvoiceConfig::from_toml_str(
            r#"
            tax_rate = 0.21

            [currency]
            label = "EUR"
            decimals = 2
            "#,
        )
        .expect("parse config");

        assert_eq!(config.tax_rate, dec!(0.21));
        assert_eq!(config.currency.label, "EUR");
        assert_eq!(config.currency.decimals, 2);
        assert_eq!(config.currency.symbol, "$");
        assert_eq!(config.truncation_budget, 40);
    }

    #[test]
    fn rejects_out_of_range_tax() {
        let err = InvoiceConfig::from_toml_str("tax_rate = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = InvoiceConfig::from_toml_str("colour = \"blue\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_inverted_ranges() {
        let err = InvoiceConfig::from_toml_str(
            r#"
            [synthetic]
            min_quantity = 5
            max_quantity = 2
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_issue_dates_beyond_ten_years() {
        let err = InvoiceConfig::from_toml_str("[synthetic]\nmax_age_days = 4000000000").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = InvoiceConfig::from_toml_str("[synthetic]\nmax_age_days = 3650")
            .expect("ten years is accepted");
        assert_eq!(config.synthetic.max_age_days, MAX_SYNTHETIC_AGE_DAYS);
    }
}
