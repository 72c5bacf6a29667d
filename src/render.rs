//! Turns an [`Invoice`] into PDF bytes.
//!
//! Rendering is split in two: [`layout::compose`] builds a plain layout tree and this module maps
//! each node onto a `genpdf` element, renders the document into memory and normalizes the
//! writer's per-run metadata.  Fonts are loaded once, when the renderer is constructed.

use genpdf::elements::Paragraph;
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Margins, PaperSize};
use log::{debug, info};

use crate::builder::DocumentBuilder;
use crate::config::InvoiceConfig;
use crate::elements::{self, mm_from_f64, RowOverflow, TableElement, VerticalSpace};
use crate::error::RenderError;
use crate::fonts;
use crate::invoice::Invoice;
use crate::layout::{self, palette, LayoutNode};
use crate::scrub;

/// MIME type of the rendered document.
pub const CONTENT_TYPE: &str = "application/pdf";

const PAGE_MARGIN_MM: f64 = 50.0 * 25.4 / 72.0;
const PAGE_MARKER_HEIGHT_MM: f64 = 8.0;
const PAGE_MARKER_FONT_SIZE: u8 = 8;

/// A finished PDF together with the metadata a caller needs to hand it out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedInvoice {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
    pub page_count: usize,
}

/// Suggested download name, `invoice_{number}.pdf`.
///
/// Characters outside `[A-Za-z0-9_-]` are replaced with `_` so the name is safe on every
/// filesystem.
pub fn suggested_filename(invoice_number: &str) -> String {
    let safe: String = invoice_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("invoice_{safe}.pdf")
}

/// Renders invoices with a fixed font family and configuration.
pub struct InvoiceRenderer {
    fonts: FontFamily<FontData>,
    config: InvoiceConfig,
}

impl InvoiceRenderer {
    pub fn new(fonts: FontFamily<FontData>, config: InvoiceConfig) -> Self {
        Self { fonts, config }
    }

    /// Creates a renderer with the font family found by [`fonts::default_font_family`].
    pub fn with_default_fonts(config: InvoiceConfig) -> Result<Self, RenderError> {
        let fonts = fonts::default_font_family().map_err(RenderError::Fonts)?;
        Ok(Self::new(fonts, config))
    }

    /// Renders `invoice` to a PDF document.
    ///
    /// Fails before any layout work if the invoice has no items, a blank number or a blank
    /// client field.  Rendering the same invoice twice yields the same bytes.
    pub fn render(&self, invoice: &Invoice) -> Result<RenderedInvoice, RenderError> {
        let layout = layout::compose(invoice, &self.config)?;
        let marker = layout.page_marker.clone();
        let marker_style = Style::new()
            .with_font_size(PAGE_MARKER_FONT_SIZE)
            .with_color(Color::Rgb(palette::GREY.0, palette::GREY.1, palette::GREY.2));

        let (mut document, pages) = DocumentBuilder::new(self.fonts.clone())
            .with_title(layout.document_title.clone())
            .with_paper_size(PaperSize::A4)
            .with_margins(Margins::all(mm_from_f64(PAGE_MARGIN_MM)))
            .with_footer(mm_from_f64(PAGE_MARKER_HEIGHT_MM), move |page| {
                let text = marker.replace("{page}", &page.to_string());
                Paragraph::new(StyledString::new(text, marker_style)).aligned(Alignment::Right)
            })
            .build();

        let overflow = RowOverflow::default();
        for node in layout.into_flow() {
            match node {
                LayoutNode::Text(block) => document.push(elements::paragraph(&block)),
                LayoutNode::Table(table) => {
                    document.push(TableElement::new(table, overflow.clone()))
                }
                LayoutNode::Spacer(height_mm) => document.push(VerticalSpace::new(height_mm)),
            }
        }

        let mut bytes = Vec::new();
        document.render(&mut bytes).map_err(|err| match overflow.get() {
            Some(row) => RenderError::RowTooTall { row },
            None => RenderError::Pdf(err),
        })?;
        scrub::normalize_metadata(&mut bytes);

        let page_count = pages.get();
        debug!(
            "Rendered invoice {} with {} items",
            invoice.invoice_number(),
            invoice.items().len()
        );
        info!(
            "Invoice {} rendered: {} bytes on {} page(s)",
            invoice.invoice_number(),
            bytes.len(),
            page_count
        );

        Ok(RenderedInvoice {
            bytes,
            filename: suggested_filename(invoice.invoice_number()),
            content_type: CONTENT_TYPE,
            page_count,
        })
    }
}
