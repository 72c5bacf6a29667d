//! Invoice building and PDF rendering.
//!
//! [`InvoiceBuilder`] turns raw line items into an [`Invoice`] with exact decimal totals and
//! [`InvoiceRenderer`] lays that invoice out as a paginated A4 document.

pub mod builder;
pub mod config;
pub mod elements;
pub mod error;
pub mod fonts;
pub mod invoice;
pub mod layout;
pub mod money;
pub mod render;
pub mod scrub;
pub mod source;

pub use config::InvoiceConfig;
pub use error::{ConfigError, RenderError, ValidationError};
pub use invoice::{ClientInfo, Invoice, InvoiceBuilder, LineItem, RawLineItem};
pub use render::{InvoiceRenderer, RenderedInvoice};
pub use source::{InvoiceSource, SourceError, SourceRecord, SyntheticSource};
