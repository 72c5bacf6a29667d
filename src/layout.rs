//! Declarative description of the printed invoice.
//!
//! [`compose`] turns an [`Invoice`] into an [`InvoiceLayout`]: plain values describing the
//! header, client block, item table, totals block and footer, with every string already
//! formatted and truncated.  Nothing here touches `genpdf` or fonts; [`crate::render`] maps the
//! tree onto the page-flow engine.

use std::borrow::Cow;

use crate::config::InvoiceConfig;
use crate::error::RenderError;
use crate::invoice::Invoice;
use crate::money::format_rate;

/// Marker appended to shortened descriptions.
pub const ELLIPSIS: &str = "...";

const PT_TO_MM: f64 = 25.4 / 72.0;

/// An sRGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Fixed palette of the invoice template.
pub mod palette {
    use super::Rgb;

    pub const DARK_BLUE: Rgb = Rgb(0, 0, 139);
    pub const LIGHT_BLUE: Rgb = Rgb(173, 216, 230);
    pub const GREY: Rgb = Rgb(128, 128, 128);
    pub const LIGHT_GREY: Rgb = Rgb(211, 211, 211);
    pub const WHITE_SMOKE: Rgb = Rgb(245, 245, 245);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Horizontal placement of text inside its box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Font attributes of a run of text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextStyle {
    pub font_size: u8,
    pub bold: bool,
    pub color: Option<Rgb>,
}

impl TextStyle {
    pub const fn regular(font_size: u8) -> Self {
        Self {
            font_size,
            bold: false,
            color: None,
        }
    }

    pub const fn bold(font_size: u8) -> Self {
        Self {
            font_size,
            bold: true,
            color: None,
        }
    }

    pub const fn colored(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }
}

/// A free-standing paragraph such as the title or the footer note.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub style: TextStyle,
    pub alignment: HorizontalAlignment,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
            alignment: HorizontalAlignment::Left,
        }
    }

    pub fn with_alignment(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }
}

/// A stroked horizontal or grid line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rule {
    pub thickness_mm: f64,
    pub color: Rgb,
}

impl Rule {
    pub fn from_points(thickness_pt: f64, color: Rgb) -> Self {
        Self {
            thickness_mm: thickness_pt * PT_TO_MM,
            color,
        }
    }
}

/// One table cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub text: String,
    pub style: TextStyle,
    pub alignment: HorizontalAlignment,
    /// Overrides the row background for this cell.
    pub background: Option<Rgb>,
}

impl Cell {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
            alignment: HorizontalAlignment::Left,
            background: None,
        }
    }

    pub fn aligned(mut self, alignment: HorizontalAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_background(mut self, background: Rgb) -> Self {
        self.background = Some(background);
        self
    }
}

/// One table row; rows are never split across pages.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub background: Option<Rgb>,
    pub rule_above: Option<Rule>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            background: None,
            rule_above: None,
        }
    }

    pub fn with_background(mut self, background: impl Into<Option<Rgb>>) -> Self {
        self.background = background.into();
        self
    }

    pub fn with_rule_above(mut self, rule: Rule) -> Self {
        self.rule_above = Some(rule);
        self
    }

    /// Cell texts in column order.
    pub fn texts(&self) -> Vec<&str> {
        self.cells.iter().map(|cell| cell.text.as_str()).collect()
    }
}

/// Where a table narrower than the page sits horizontally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Placement {
    #[default]
    Leading,
    Trailing,
}

/// A table with fixed column widths.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub column_widths_mm: Vec<f64>,
    pub rows: Vec<Row>,
    pub grid: Option<Rule>,
    pub placement: Placement,
    pub padding_x_mm: f64,
    pub padding_y_mm: f64,
}

impl Table {
    /// Creates a table from column widths given in points.
    pub fn with_point_widths(widths_pt: &[f64]) -> Self {
        Self {
            column_widths_mm: widths_pt.iter().map(|pt| pt * PT_TO_MM).collect(),
            rows: Vec::new(),
            grid: None,
            placement: Placement::Leading,
            padding_x_mm: 8.0 * PT_TO_MM,
            padding_y_mm: 8.0 * PT_TO_MM,
        }
    }

    pub fn width_mm(&self) -> f64 {
        self.column_widths_mm.iter().sum()
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }
}

/// A table preceded by a section heading.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSection {
    pub heading: TextBlock,
    pub table: Table,
}

/// Flow element consumed by the renderer in order.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutNode {
    Text(TextBlock),
    Table(Table),
    /// Vertical gap in millimetres.
    Spacer(f64),
}

/// The complete, fixed-structure invoice document.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceLayout {
    /// Title stored in the document metadata.
    pub document_title: String,
    /// Text of the small marker printed at the bottom of every page; `{page}` is replaced.
    pub page_marker: String,
    pub header: TextBlock,
    pub client_block: TableSection,
    pub item_table: TableSection,
    pub totals: TableSection,
    pub footer: TextBlock,
}

impl InvoiceLayout {
    /// Flattens the layout into the order it is placed on the page.
    pub fn into_flow(self) -> Vec<LayoutNode> {
        let mut flow = vec![LayoutNode::Text(self.header), LayoutNode::Spacer(8.0)];
        for section in [self.client_block, self.item_table] {
            flow.push(LayoutNode::Text(section.heading));
            flow.push(LayoutNode::Spacer(3.0));
            flow.push(LayoutNode::Table(section.table));
            flow.push(LayoutNode::Spacer(8.0));
        }
        flow.push(LayoutNode::Text(self.totals.heading));
        flow.push(LayoutNode::Spacer(5.0));
        flow.push(LayoutNode::Table(self.totals.table));
        flow.push(LayoutNode::Spacer(14.0));
        flow.push(LayoutNode::Text(self.footer));
        flow
    }
}

/// Shortens `text` to `budget` characters, ending in [`ELLIPSIS`], when it is longer than that.
pub fn truncate_description(text: &str, budget: usize) -> Cow<'_, str> {
    if text.chars().count() <= budget {
        return Cow::Borrowed(text);
    }
    let keep = budget.saturating_sub(ELLIPSIS.len());
    let mut shortened: String = text.chars().take(keep).collect();
    shortened.push_str(ELLIPSIS);
    Cow::Owned(shortened)
}

/// Checks the invoice against the renderer's preconditions.
pub fn check_renderable(invoice: &Invoice) -> Result<(), RenderError> {
    if invoice.invoice_number().trim().is_empty() {
        return Err(RenderError::EmptyInvoiceNumber);
    }
    if invoice.items().is_empty() {
        return Err(RenderError::NoItems);
    }
    if let Some(field) = invoice.client().first_missing_field() {
        return Err(RenderError::MissingClientField(field));
    }
    Ok(())
}

const SECTION_HEADING: TextStyle = TextStyle::bold(14).colored(palette::DARK_BLUE);

/// Builds the layout tree for `invoice`.
pub fn compose(invoice: &Invoice, config: &InvoiceConfig) -> Result<InvoiceLayout, RenderError> {
    check_renderable(invoice)?;

    let number = invoice.invoice_number();
    Ok(InvoiceLayout {
        document_title: format!("Invoice {number}"),
        page_marker: format!("Invoice {number} - page {{page}}"),
        header: TextBlock::new(
            format!("INVOICE {number}"),
            TextStyle::bold(20).colored(palette::DARK_BLUE),
        )
        .with_alignment(HorizontalAlignment::Center),
        client_block: TableSection {
            heading: TextBlock::new("Client Information", SECTION_HEADING),
            table: client_table(invoice),
        },
        item_table: TableSection {
            heading: TextBlock::new("Products and Services", SECTION_HEADING),
            table: item_table(invoice, config),
        },
        totals: TableSection {
            heading: TextBlock::new("Totals Summary", SECTION_HEADING),
            table: totals_table(invoice, config),
        },
        footer: TextBlock::new(
            "Thank you for your business - This document is valid as an electronic invoice",
            TextStyle::regular(9).colored(palette::GREY),
        )
        .with_alignment(HorizontalAlignment::Center),
    })
}

fn client_table(invoice: &Invoice) -> Table {
    let client = invoice.client();
    let issue_date = invoice.issue_date().format("%Y-%m-%d").to_string();
    let entries = [
        ("Date:", issue_date.as_str()),
        ("Client:", client.name.as_str()),
        ("Email:", client.email.as_str()),
        ("Phone:", client.phone.as_str()),
        ("Address:", client.address.as_str()),
        ("City:", client.city.as_str()),
    ];

    let mut table = Table::with_point_widths(&[120.0, 300.0]);
    table.padding_x_mm = 10.0 * PT_TO_MM;
    table.grid = Some(Rule::from_points(0.5, palette::GREY));
    for (label, value) in entries {
        table.push_row(Row::new(vec![
            Cell::new(label, TextStyle::bold(11).colored(palette::DARK_BLUE))
                .aligned(HorizontalAlignment::Right)
                .with_background(palette::LIGHT_BLUE),
            Cell::new(value, TextStyle::regular(11)),
        ]));
    }
    table
}

fn item_table(invoice: &Invoice, config: &InvoiceConfig) -> Table {
    let currency = &config.currency;
    let header_style = TextStyle::bold(11).colored(palette::WHITE_SMOKE);
    let body_style = TextStyle::regular(10);

    let mut table = Table::with_point_widths(&[180.0, 70.0, 100.0, 120.0]);
    table.grid = Some(Rule::from_points(0.5, palette::GREY));
    table.push_row(
        Row::new(vec![
            Cell::new("Description", header_style),
            Cell::new("Quantity", header_style).aligned(HorizontalAlignment::Center),
            Cell::new("Unit Price", header_style).aligned(HorizontalAlignment::Center),
            Cell::new("Subtotal", header_style).aligned(HorizontalAlignment::Center),
        ])
        .with_background(palette::DARK_BLUE),
    );

    for (index, item) in invoice.items().iter().enumerate() {
        let stripe = if index % 2 == 0 {
            palette::WHITE
        } else {
            palette::LIGHT_GREY
        };
        let description = truncate_description(item.description(), config.truncation_budget);
        table.push_row(
            Row::new(vec![
                Cell::new(description, body_style),
                Cell::new(item.quantity().to_string(), body_style)
                    .aligned(HorizontalAlignment::Center),
                Cell::new(currency.format(item.unit_price()), body_style)
                    .aligned(HorizontalAlignment::Right),
                Cell::new(currency.format(item.line_subtotal()), body_style)
                    .aligned(HorizontalAlignment::Right),
            ])
            .with_background(stripe),
        );
    }
    table
}

fn totals_table(invoice: &Invoice, config: &InvoiceConfig) -> Table {
    let currency = &config.currency;
    let regular = TextStyle::regular(12);
    let emphasized = TextStyle::bold(14).colored(palette::DARK_BLUE);
    let row = |label: String, amount: String, style: TextStyle| {
        Row::new(vec![
            Cell::new(label, style).aligned(HorizontalAlignment::Right),
            Cell::new(amount, style).aligned(HorizontalAlignment::Right),
        ])
    };

    let mut table = Table::with_point_widths(&[150.0, 120.0]);
    table.placement = Placement::Trailing;
    table.padding_x_mm = 10.0 * PT_TO_MM;
    table.push_row(row(
        "Subtotal:".to_owned(),
        currency.format(invoice.subtotal()),
        regular,
    ));
    table.push_row(row(
        format!("Tax ({}):", format_rate(invoice.tax_rate())),
        currency.format(invoice.tax()),
        regular,
    ));
    table.push_row(
        row(String::new(), String::new(), TextStyle::regular(4))
            .with_rule_above(Rule::from_points(1.0, palette::GREY)),
    );
    table.push_row(
        row(
            "TOTAL:".to_owned(),
            currency.format(invoice.total()),
            emphasized,
        )
        .with_background(palette::LIGHT_BLUE)
        .with_rule_above(Rule::from_points(2.0, palette::DARK_BLUE)),
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::tests::{client, date};
    use crate::invoice::{InvoiceBuilder, RawLineItem};
    use rust_decimal_macros::dec;

    fn invoice(items: &[RawLineItem]) -> Invoice {
        InvoiceBuilder::new(dec!(0.19))
            .expect("valid rate")
            .build("F001-001", date(), client(), items)
            .expect("build invoice")
    }

    fn scenario() -> Invoice {
        invoice(&[
            RawLineItem::new("Consulting", 2, dec!(100000)),
            RawLineItem::new("Support", 1, dec!(50000)),
        ])
    }

    #[test]
    fn truncation_boundary() {
        let exact = "x".repeat(40);
        assert_eq!(truncate_description(&exact, 40), exact.as_str());

        let longer = "y".repeat(41);
        let shortened = truncate_description(&longer, 40);
        assert_eq!(shortened.chars().count(), 40);
        assert!(shortened.ends_with(ELLIPSIS));
        assert_eq!(&shortened[..37], &longer[..37]);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let accented = "é".repeat(40);
        assert_eq!(truncate_description(&accented, 40), accented.as_str());
        let long = "ñ".repeat(45);
        let shortened = truncate_description(&long, 40);
        assert_eq!(shortened.chars().count(), 40);
    }

    #[test]
    fn title_contains_invoice_number() {
        let layout = compose(&scenario(), &InvoiceConfig::default()).expect("compose");
        assert_eq!(layout.header.text, "INVOICE F001-001");
        assert_eq!(layout.header.alignment, HorizontalAlignment::Center);
        assert!(layout.document_title.contains("F001-001"));
    }

    #[test]
    fn item_rows_follow_input_order() {
        let items: Vec<_> = ["Zeta", "Alpha", "Mu", "Beta"]
            .iter()
            .map(|name| RawLineItem::new(*name, 1, dec!(10)))
            .collect();
        let layout = compose(&invoice(&items), &InvoiceConfig::default()).expect("compose");

        let descriptions: Vec<_> = layout.item_table.table.rows[1..]
            .iter()
            .map(|row| row.cells[0].text.clone())
            .collect();
        assert_eq!(descriptions, ["Zeta", "Alpha", "Mu", "Beta"]);
    }

    #[test]
    fn long_descriptions_are_shortened_only_in_the_layout() {
        let long = "Integrated payroll module configuration and rollout";
        let invoice = invoice(&[RawLineItem::new(long, 1, dec!(10))]);
        let layout = compose(&invoice, &InvoiceConfig::default()).expect("compose");

        let shown = &layout.item_table.table.rows[1].cells[0].text;
        assert_eq!(shown, "Integrated payroll module configurati...");
        assert_eq!(invoice.items()[0].description(), long);
    }

    #[test]
    fn item_rows_are_striped_and_formatted() {
        let layout = compose(&scenario(), &InvoiceConfig::default()).expect("compose");
        let rows = &layout.item_table.table.rows;

        assert_eq!(
            rows[0].texts(),
            ["Description", "Quantity", "Unit Price", "Subtotal"]
        );
        assert_eq!(rows[0].background, Some(palette::DARK_BLUE));
        assert_eq!(
            rows[1].texts(),
            ["Consulting", "2", "$100,000 COP", "$200,000 COP"]
        );
        assert_eq!(rows[1].background, Some(palette::WHITE));
        assert_eq!(rows[2].background, Some(palette::LIGHT_GREY));
        assert_eq!(rows[1].cells[2].alignment, HorizontalAlignment::Right);
        assert_eq!(rows[1].cells[1].alignment, HorizontalAlignment::Center);
    }

    #[test]
    fn totals_block_sits_at_trailing_edge() {
        let layout = compose(&scenario(), &InvoiceConfig::default()).expect("compose");
        let totals = &layout.totals.table;

        assert_eq!(totals.placement, Placement::Trailing);
        assert_eq!(totals.rows[0].texts(), ["Subtotal:", "$250,000 COP"]);
        assert_eq!(totals.rows[1].texts(), ["Tax (19%):", "$47,500 COP"]);
        assert!(totals.rows[2].rule_above.is_some());

        let total = &totals.rows[3];
        assert_eq!(total.texts(), ["TOTAL:", "$297,500 COP"]);
        assert!(total.cells.iter().all(|cell| cell.style.bold));
        assert_eq!(total.background, Some(palette::LIGHT_BLUE));
    }

    #[test]
    fn client_block_lists_identity_fields() {
        let layout = compose(&scenario(), &InvoiceConfig::default()).expect("compose");
        let rows = &layout.client_block.table.rows;

        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].texts(), ["Date:", "2024-05-14"]);
        assert_eq!(rows[5].texts(), ["City:", "Bogotá"]);
        assert!(rows
            .iter()
            .all(|row| row.cells[0].style.bold && row.cells[0].background.is_some()));
    }

    #[test]
    fn flow_keeps_fixed_section_order() {
        let layout = compose(&scenario(), &InvoiceConfig::default()).expect("compose");
        let texts: Vec<_> = layout
            .into_flow()
            .into_iter()
            .filter_map(|node| match node {
                LayoutNode::Text(block) => Some(block.text),
                _ => None,
            })
            .collect();

        assert_eq!(texts.first().map(String::as_str), Some("INVOICE F001-001"));
        assert_eq!(texts[1], "Client Information");
        assert_eq!(texts[2], "Products and Services");
        assert_eq!(texts[3], "Totals Summary");
        assert!(texts[4].starts_with("Thank you"));
    }

    #[test]
    fn empty_items_cannot_be_composed() {
        let mut invoice = scenario();
        invoice.items.clear();
        assert!(matches!(
            compose(&invoice, &InvoiceConfig::default()),
            Err(RenderError::NoItems)
        ));
    }

    #[test]
    fn missing_client_field_cannot_be_composed() {
        let mut invoice = scenario();
        invoice.client.email = String::new();
        assert!(matches!(
            compose(&invoice, &InvoiceConfig::default()),
            Err(RenderError::MissingClientField("email"))
        ));
    }
}
