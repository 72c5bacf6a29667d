//! Invoice data model and the builder that derives its totals.
//!
//! An [`Invoice`] can only be obtained from [`InvoiceBuilder::build`] (or by deserializing, which
//! goes through the builder as well), so `line_subtotal`, `subtotal`, `tax` and `total` always
//! agree with the line items they were computed from.

use chrono::NaiveDate;
use log::debug;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::InvoiceConfig;
use crate::error::ValidationError;
use crate::money::round_money;
use crate::source::{InvoiceSource, SourceError};

/// Identity block of the invoiced client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
}

impl ClientInfo {
    /// Returns the labelled fields in display order.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("name", self.name.as_str()),
            ("email", self.email.as_str()),
            ("phone", self.phone.as_str()),
            ("address", self.address.as_str()),
            ("city", self.city.as_str()),
        ]
    }

    /// Returns the name of the first blank field, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
    }
}

/// Unvalidated line item as supplied by a data source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineItem {
    pub description: String,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

impl RawLineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    /// Builds a raw item from a floating point price, rejecting NaN and infinities.
    pub fn with_float_price(
        description: impl Into<String>,
        quantity: i64,
        unit_price: f64,
    ) -> Result<Self, ValidationError> {
        let unit_price =
            Decimal::from_f64(unit_price).ok_or_else(|| ValidationError::NonFinitePrice {
                value: unit_price.to_string(),
            })?;
        Ok(Self::new(description, quantity, unit_price))
    }
}

/// A validated line item with its derived subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    description: String,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    line_subtotal: Decimal,
}

impl LineItem {
    /// Full, untruncated description.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// `quantity * unit_price`, rounded to two places.
    pub fn line_subtotal(&self) -> Decimal {
        self.line_subtotal
    }
}

/// A fully populated, immutable invoice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "InvoiceRecord")]
pub struct Invoice {
    pub(crate) invoice_number: String,
    pub(crate) issue_date: NaiveDate,
    pub(crate) client: ClientInfo,
    pub(crate) items: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub(crate) tax_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub(crate) subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub(crate) tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub(crate) total: Decimal,
}

impl Invoice {
    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn issue_date(&self) -> NaiveDate {
        self.issue_date
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Line items in the order they were supplied.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn tax(&self) -> Decimal {
        self.tax
    }

    pub fn total(&self) -> Decimal {
        self.total
    }
}

/// Wire shape of an invoice; converted through the builder on deserialization.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceRecord {
    invoice_number: String,
    issue_date: NaiveDate,
    client: ClientInfo,
    items: Vec<LineItemRecord>,
    #[serde(with = "rust_decimal::serde::float")]
    tax_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineItemRecord {
    description: String,
    quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    line_subtotal: Decimal,
}

impl TryFrom<InvoiceRecord> for Invoice {
    type Error = ValidationError;

    fn try_from(record: InvoiceRecord) -> Result<Self, Self::Error> {
        let raw: Vec<RawLineItem> = record
            .items
            .iter()
            .map(|item| RawLineItem::new(item.description.clone(), item.quantity, item.unit_price))
            .collect();

        let invoice = InvoiceBuilder::new(record.tax_rate)?.build(
            record.invoice_number,
            record.issue_date,
            record.client,
            &raw,
        )?;

        for (built, supplied) in invoice.items.iter().zip(&record.items) {
            ensure_consistent("lineSubtotal", built.line_subtotal, supplied.line_subtotal)?;
        }
        ensure_consistent("subtotal", invoice.subtotal, record.subtotal)?;
        ensure_consistent("tax", invoice.tax, record.tax)?;
        ensure_consistent("total", invoice.total, record.total)?;

        Ok(invoice)
    }
}

fn ensure_consistent(
    field: &'static str,
    expected: Decimal,
    actual: Decimal,
) -> Result<(), ValidationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ValidationError::InconsistentTotals {
            field,
            expected,
            actual,
        })
    }
}

/// Computes line subtotals and invoice totals for a fixed tax rate.
#[derive(Clone, Debug)]
pub struct InvoiceBuilder {
    tax_rate: Decimal,
}

impl InvoiceBuilder {
    /// Creates a builder; the rate must lie within `0..=1`.
    pub fn new(tax_rate: Decimal) -> Result<Self, ValidationError> {
        if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
            return Err(ValidationError::InvalidTaxRate(tax_rate));
        }
        Ok(Self { tax_rate })
    }

    /// Creates a builder using the configured tax rate.
    pub fn from_config(config: &InvoiceConfig) -> Result<Self, ValidationError> {
        Self::new(config.tax_rate)
    }

    /// Validates the inputs and assembles an invoice.
    ///
    /// Fails on the first violated precondition; no invoice is produced on error.
    pub fn build(
        &self,
        invoice_number: impl Into<String>,
        issue_date: NaiveDate,
        client: ClientInfo,
        items: &[RawLineItem],
    ) -> Result<Invoice, ValidationError> {
        let invoice_number = invoice_number.into();
        if invoice_number.trim().is_empty() {
            return Err(ValidationError::EmptyInvoiceNumber);
        }
        if items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        if let Some(field) = client.first_missing_field() {
            return Err(ValidationError::MissingClientField(field));
        }

        let items = items
            .iter()
            .enumerate()
            .map(|(index, raw)| line_item(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let sum = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_subtotal))
            .ok_or(ValidationError::Overflow { what: "subtotal" })?;
        let subtotal = round_money(sum);
        let tax = round_money(
            subtotal
                .checked_mul(self.tax_rate)
                .ok_or(ValidationError::Overflow { what: "tax" })?,
        );
        let total = round_money(
            subtotal
                .checked_add(tax)
                .ok_or(ValidationError::Overflow { what: "total" })?,
        );

        debug!(
            "Built invoice {} with {} items (subtotal {}, tax {}, total {})",
            invoice_number,
            items.len(),
            subtotal,
            tax,
            total
        );

        Ok(Invoice {
            invoice_number,
            issue_date,
            client,
            items,
            tax_rate: self.tax_rate,
            subtotal,
            tax,
            total,
        })
    }

    /// Pulls raw values for `invoice_number` from `source` and builds them.
    pub fn build_from_source<S>(
        &self,
        source: &S,
        invoice_number: &str,
    ) -> Result<Invoice, SourceError>
    where
        S: InvoiceSource + ?Sized,
    {
        let record = source.generate(invoice_number)?;
        self.build(invoice_number, record.issue_date, record.client, &record.items)
            .map_err(SourceError::Invalid)
    }
}

fn line_item(index: usize, raw: &RawLineItem) -> Result<LineItem, ValidationError> {
    if raw.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription { index });
    }
    let quantity = u32::try_from(raw.quantity)
        .ok()
        .filter(|quantity| *quantity >= 1)
        .ok_or(ValidationError::InvalidQuantity {
            index,
            quantity: raw.quantity,
        })?;
    if raw.unit_price.is_sign_negative() && !raw.unit_price.is_zero() {
        return Err(ValidationError::NegativeUnitPrice {
            index,
            price: raw.unit_price,
        });
    }

    let line_subtotal = raw
        .unit_price
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or(ValidationError::Overflow {
            what: "line subtotal",
        })?;

    Ok(LineItem {
        description: raw.description.clone(),
        quantity,
        unit_price: raw.unit_price,
        line_subtotal,
    })
}
