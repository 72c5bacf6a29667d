//! Error types shared by the invoice builder, the renderer and the configuration loader.

use std::io;

use rust_decimal::Decimal;
use thiserror::Error;

/// Client fields that must be present on every invoice.
pub type ClientField = &'static str;

/// Malformed or inconsistent input handed to the invoice builder.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invoice number must not be empty")]
    EmptyInvoiceNumber,

    #[error("an invoice needs at least one line item")]
    NoItems,

    #[error("line item {index} has an empty description")]
    EmptyDescription { index: usize },

    #[error("line item {index} has quantity {quantity}; quantities start at 1")]
    InvalidQuantity { index: usize, quantity: i64 },

    #[error("line item {index} has negative unit price {price}")]
    NegativeUnitPrice { index: usize, price: Decimal },

    #[error("unit price {value} is not a finite number")]
    NonFinitePrice { value: String },

    #[error("client field `{0}` is missing")]
    MissingClientField(ClientField),

    #[error("arithmetic overflow while computing {what}")]
    Overflow { what: &'static str },

    #[error("{field} is {actual} but the line items add up to {expected}")]
    InconsistentTotals {
        field: &'static str,
        expected: Decimal,
        actual: Decimal,
    },

    #[error("tax rate {0} must lie between 0 and 1")]
    InvalidTaxRate(Decimal),
}

/// An invoice that cannot be turned into a document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invoice has no line items to render")]
    NoItems,

    #[error("invoice number is empty")]
    EmptyInvoiceNumber,

    #[error("client field `{0}` is missing")]
    MissingClientField(ClientField),

    #[error("table row {row} is taller than a full page")]
    RowTooTall { row: usize },

    #[error("failed to load fonts: {0}")]
    Fonts(#[source] genpdf::error::Error),

    #[error("PDF engine failed: {0}")]
    Pdf(#[source] genpdf::error::Error),
}

/// Problems reading or validating an [`InvoiceConfig`](crate::config::InvoiceConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
