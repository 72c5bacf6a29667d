//! Pluggable providers of raw invoice data.
//!
//! The builder never invents values. Whatever feeds it implements [`InvoiceSource`]; the crate
//! ships [`SyntheticSource`], which derives plausible data from a SHA-256 digest of the invoice
//! number so the same number always yields the same invoice.

use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDate};
use log::debug;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::SyntheticRanges;
use crate::error::ValidationError;
use crate::invoice::{ClientInfo, RawLineItem};

/// Everything the builder needs besides the invoice number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRecord {
    pub issue_date: NaiveDate,
    pub client: ClientInfo,
    pub items: Vec<RawLineItem>,
}

/// Failures reported by an invoice source.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Maps to a client error ("not found") at the transport layer.
    #[error("invoice {0} was not found")]
    NotFound(String),

    /// Maps to a service-unavailable error at the transport layer.
    #[error("invoice source is unreachable: {0}")]
    Unavailable(String),

    #[error("invoice source returned invalid data: {0}")]
    Invalid(#[from] ValidationError),
}

/// Provider of raw invoice values keyed by invoice number.
pub trait InvoiceSource {
    fn generate(&self, invoice_number: &str) -> Result<SourceRecord, SourceError>;
}

impl<F> InvoiceSource for F
where
    F: Fn(&str) -> Result<SourceRecord, SourceError>,
{
    fn generate(&self, invoice_number: &str) -> Result<SourceRecord, SourceError> {
        self(invoice_number)
    }
}

const DESCRIPTIONS: &[&str] = &[
    "Managed cloud hosting",
    "Quarterly security audit",
    "On-site network installation",
    "Custom reporting dashboard",
    "Annual software license renewal",
    "Database migration and performance tuning service",
    "Priority support plan",
    "Employee onboarding workshop",
    "Integrated payroll module configuration and rollout",
    "Backup storage (1 TB)",
    "Mobile app maintenance",
    "Compliance documentation review",
];

const FIRST_NAMES: &[&str] = &[
    "Ana", "Carlos", "Lucia", "Mateo", "Sofia", "Diego", "Valentina", "Javier", "Camila", "Andres",
];

const LAST_NAMES: &[&str] = &[
    "Garcia", "Martinez", "Lopez", "Romero", "Torres", "Ramirez", "Castro", "Vargas", "Herrera",
];

const STREETS: &[&str] = &[
    "Calle Mayor",
    "Avenida Libertad",
    "Carrera 7",
    "Paseo de la Castellana",
    "Calle del Sol",
    "Avenida Bolivar",
];

const CITIES: &[&str] = &[
    "Madrid", "Bogota", "Sevilla", "Medellin", "Valencia", "Cali", "Zaragoza", "Barranquilla",
];

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "mail.example.net"];

/// Deterministic stand-in for an external invoice service.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    ranges: SyntheticRanges,
    reference_date: NaiveDate,
}

impl SyntheticSource {
    /// Creates a source whose issue dates end at `reference_date`.
    pub fn new(ranges: SyntheticRanges, reference_date: NaiveDate) -> Self {
        Self {
            ranges,
            reference_date,
        }
    }
}

impl InvoiceSource for SyntheticSource {
    fn generate(&self, invoice_number: &str) -> Result<SourceRecord, SourceError> {
        if invoice_number.trim().is_empty() {
            return Err(SourceError::NotFound(invoice_number.to_owned()));
        }

        let mut rng = DigestStream::new(invoice_number);
        let ranges = &self.ranges;

        let age = rng.pick(0..=i64::from(ranges.max_age_days));
        let issue_date = self
            .reference_date
            .checked_sub_signed(Duration::days(age))
            .ok_or_else(|| {
                SourceError::Unavailable(format!(
                    "issue date {} days before {} is out of range",
                    age, self.reference_date
                ))
            })?;

        let first = rng.choose(FIRST_NAMES);
        let last = rng.choose(LAST_NAMES);
        let domain = rng.choose(EMAIL_DOMAINS);
        let client = ClientInfo {
            name: format!("{first} {last}"),
            email: format!("{}.{}@{domain}", first.to_lowercase(), last.to_lowercase()),
            phone: format!(
                "+34 6{:02} {:03} {:03}",
                rng.pick(0..=99),
                rng.pick(0..=999),
                rng.pick(0..=999)
            ),
            address: format!(
                "{} {}, {:05}",
                rng.choose(STREETS),
                rng.pick(1..=199),
                rng.pick(1000..=52999)
            ),
            city: rng.choose(CITIES).to_owned(),
        };

        let quantities = i64::from(ranges.min_quantity)..=i64::from(ranges.max_quantity);
        let count = rng.pick_usize(ranges.items());
        let items = (0..count)
            .map(|_| {
                let description = rng.choose(DESCRIPTIONS);
                let quantity = rng.pick(quantities.clone());
                let cents = rng.pick(ranges.price_cents());
                RawLineItem::new(description, quantity, Decimal::new(cents, 2))
            })
            .collect::<Vec<_>>();

        debug!(
            "Synthesized invoice {} with {} items dated {}",
            invoice_number,
            items.len(),
            issue_date
        );

        Ok(SourceRecord {
            issue_date,
            client,
            items,
        })
    }
}

/// Expands a seed into an endless stream of pseudo-random words by hashing `seed || counter`.
struct DigestStream {
    seed: Vec<u8>,
    counter: u64,
    block: [u8; 32],
    offset: usize,
}

impl DigestStream {
    fn new(seed: &str) -> Self {
        let mut stream = Self {
            seed: seed.as_bytes().to_vec(),
            counter: 0,
            block: [0; 32],
            offset: 32,
        };
        stream.refill();
        stream
    }

    fn refill(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(&self.seed);
        hasher.update(self.counter.to_le_bytes());
        self.block = hasher.finalize().into();
        self.counter += 1;
        self.offset = 0;
    }

    fn next_u64(&mut self) -> u64 {
        if self.offset + 8 > self.block.len() {
            self.refill();
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.block[self.offset..self.offset + 8]);
        self.offset += 8;
        u64::from_le_bytes(word)
    }

    /// Uniform-enough value within `range`; the ranges involved are tiny next to `u64`.
    fn pick(&mut self, range: RangeInclusive<i64>) -> i64 {
        let (start, end) = range.into_inner();
        let span = end.abs_diff(start) + 1;
        start + (self.next_u64() % span) as i64
    }

    fn pick_usize(&mut self, range: RangeInclusive<usize>) -> usize {
        let (start, end) = range.into_inner();
        start + (self.next_u64() % (end - start + 1) as u64) as usize
    }

    fn choose<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.pick_usize(0..=options.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SyntheticSource {
        SyntheticSource::new(
            SyntheticRanges::default(),
            NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date"),
        )
    }

    #[test]
    fn same_number_same_record() {
        let a = source().generate("F001-001").expect("generate");
        let b = source().generate("F001-001").expect("generate");
        assert_eq!(a, b);

        let other = source().generate("F001-002").expect("generate");
        assert_ne!(a, other);
    }

    #[test]
    fn values_stay_within_configured_ranges() {
        let ranges = SyntheticRanges::default();
        let reference = NaiveDate::from_ymd_opt(2024, 6, 30).expect("valid date");
        for n in 0..200 {
            let record = source().generate(&format!("INV-{n:04}")).expect("generate");
            assert!(ranges.items().contains(&record.items.len()));
            assert!(record.issue_date <= reference);
            assert!(record.issue_date >= reference - Duration::days(30));
            assert!(record.client.first_missing_field().is_none());
            for item in &record.items {
                assert!((1..=10).contains(&item.quantity));
                assert!(item.unit_price >= Decimal::new(1000, 2));
                assert!(item.unit_price <= Decimal::new(50000, 2));
                assert!(item.unit_price.scale() <= 2);
                assert!(!item.description.is_empty());
            }
        }
    }

    #[test]
    fn blank_number_is_not_found() {
        assert_eq!(
            source().generate(" ").unwrap_err(),
            SourceError::NotFound(" ".to_owned())
        );
    }

    #[test]
    fn closures_act_as_sources() {
        let unreachable = |_: &str| -> Result<SourceRecord, SourceError> {
            Err(SourceError::Unavailable("connection refused".to_owned()))
        };
        assert!(matches!(
            unreachable.generate("F1"),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn unrepresentable_issue_date_is_an_error() {
        let ranges = SyntheticRanges {
            max_age_days: u32::MAX,
            ..SyntheticRanges::default()
        };
        let source = SyntheticSource::new(ranges, NaiveDate::MIN);
        let result = source.generate("F001-001");
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
    }
}
