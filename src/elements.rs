//! `genpdf` elements for the invoice layout tree.
//!
//! The upstream crate ships a table layout, but it cannot paint cell backgrounds or draw rules
//! between selected rows, and it gives no guarantee about where a row lands.  [`TableElement`]
//! draws a [`layout::Table`] row by row and only ever moves whole rows onto the next page.

use std::cell::Cell as SharedCell;
use std::rc::Rc;

use genpdf::elements::Paragraph;
use genpdf::error::{Error, ErrorKind};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{render, Alignment, Element, Mm, Position, RenderResult, Size};

use crate::layout::{self, HorizontalAlignment, Placement, Rgb, TextBlock, TextStyle};

/// Width of a stroke drawn with the PDF default line width of one point.
const STROKE_WIDTH_MM: f64 = 25.4 / 72.0;

/// Largest gap between neighbouring strokes of a filled band.
const FILL_PITCH_MM: f64 = 0.3;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn alignment(alignment: HorizontalAlignment) -> Alignment {
    match alignment {
        HorizontalAlignment::Left => Alignment::Left,
        HorizontalAlignment::Center => Alignment::Center,
        HorizontalAlignment::Right => Alignment::Right,
    }
}

/// Converts a layout text style into a `genpdf` style layered on top of `base`.
pub fn text_style(base: Style, text: &TextStyle) -> Style {
    let mut style = Style::new().with_font_size(text.font_size);
    if text.bold {
        style = style.bold();
    }
    if let Some(rgb) = text.color {
        style = style.with_color(color(rgb));
    }
    base.and(style)
}

/// Builds the paragraph for a free-standing text block.
pub fn paragraph(block: &TextBlock) -> Paragraph {
    let style = text_style(Style::new(), &block.style);
    Paragraph::new(StyledString::new(block.text.clone(), style)).aligned(alignment(block.alignment))
}

/// Greedy word wrap of `text` into lines no wider than `max_width`.
///
/// `measure` returns the printed width of a candidate line.  A word wider than `max_width` is
/// broken at character boundaries.
pub fn wrap_text<F>(text: &str, max_width: f64, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            for (index, piece) in split_word(word, max_width, &measure).into_iter().enumerate() {
                if current.is_empty() {
                    current = piece;
                    continue;
                }
                let candidate = format!("{current} {piece}");
                if index == 0 && measure(&candidate) <= max_width {
                    current = candidate;
                } else {
                    lines.push(std::mem::replace(&mut current, piece));
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Splits `word` into pieces that each fit `max_width`; a piece holds at least one character.
fn split_word<F>(word: &str, max_width: f64, measure: &F) -> Vec<String>
where
    F: Fn(&str) -> f64,
{
    if measure(word) <= max_width {
        return vec![word.to_owned()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().count() > 1 && measure(&piece) > max_width {
            piece.pop();
            pieces.push(std::mem::replace(&mut piece, ch.to_string()));
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Vertical positions of horizontal strokes that together cover the band `top..top + height`.
fn stroke_offsets(top: f64, height: f64) -> Vec<f64> {
    let half = STROKE_WIDTH_MM / 2.0;
    let first = top + half;
    let last = top + height - half;
    if last <= first {
        return vec![top + height / 2.0];
    }
    let steps = ((last - first) / FILL_PITCH_MM).ceil().max(1.0) as usize;
    (0..=steps)
        .map(|step| first + (last - first) * step as f64 / steps as f64)
        .collect()
}

/// Index of the table row currently waiting for more vertical space.
///
/// Set when a row is pushed to the next page and cleared once the table is done, so a rendering
/// failure with the slot still set means that row does not fit on an empty page.
#[derive(Clone, Debug, Default)]
pub struct RowOverflow(Rc<SharedCell<Option<usize>>>);

impl RowOverflow {
    pub fn get(&self) -> Option<usize> {
        self.0.get()
    }

    fn record(&self, row: usize) {
        self.0.set(Some(row));
    }

    fn clear(&self) {
        self.0.set(None);
    }
}

/// Rows placed on one page by [`RowCursor::fill_page`].
struct PageFill<T> {
    rows: Vec<T>,
    has_more: bool,
}

/// Tracks the next row to place; rows are placed whole or not at all.
#[derive(Debug, Default)]
struct RowCursor {
    next_row: usize,
    stalled: bool,
}

impl RowCursor {
    /// Places rows from `next_row` onward while they fit into `available`.
    ///
    /// `prepare` returns the height of a row together with whatever the caller needs to draw it.
    /// Fails with the row index when a row is left over twice in a row without anything placed,
    /// that is when it does not fit on an empty page.
    fn fill_page<T, F>(
        &mut self,
        total: usize,
        available: f64,
        mut prepare: F,
    ) -> Result<PageFill<T>, usize>
    where
        F: FnMut(usize) -> (f64, T),
    {
        let mut rows = Vec::new();
        let mut used = 0.0;
        while self.next_row < total {
            let (height, row) = prepare(self.next_row);
            if used + height > available {
                if rows.is_empty() {
                    if self.stalled {
                        return Err(self.next_row);
                    }
                    self.stalled = true;
                }
                return Ok(PageFill {
                    rows,
                    has_more: true,
                });
            }
            used += height;
            rows.push(row);
            self.next_row += 1;
            self.stalled = false;
        }
        Ok(PageFill {
            rows,
            has_more: false,
        })
    }
}

struct PreparedCell {
    lines: Vec<(String, f64)>,
    style: Style,
    line_height: f64,
}

struct PreparedRow {
    cells: Vec<PreparedCell>,
    height: f64,
}

/// Renders a [`layout::Table`], keeping every row whole.
pub struct TableElement {
    table: layout::Table,
    cursor: RowCursor,
    overflow: RowOverflow,
}

impl TableElement {
    pub fn new(table: layout::Table, overflow: RowOverflow) -> Self {
        Self {
            table,
            cursor: RowCursor::default(),
            overflow,
        }
    }
}

fn prepare_row(
    table: &layout::Table,
    context: &genpdf::Context,
    base: Style,
    index: usize,
) -> PreparedRow {
    let row = &table.rows[index];
    let mut height: f64 = 0.0;
    let cells = row
        .cells
        .iter()
        .zip(&table.column_widths_mm)
        .map(|(cell, width)| {
            let style = text_style(base, &cell.style);
            let measure =
                |s: &str| mm_to_f64(StyledString::new(s, style).width(&context.font_cache));
            let inner_width = width - 2.0 * table.padding_x_mm;
            let lines: Vec<_> = wrap_text(&cell.text, inner_width, &measure)
                .into_iter()
                .map(|line| {
                    let width = measure(&line);
                    (line, width)
                })
                .collect();
            let line_height = mm_to_f64(style.line_height(&context.font_cache));
            height = height.max(lines.len().max(1) as f64 * line_height);
            PreparedCell {
                lines,
                style,
                line_height,
            }
        })
        .collect();

    PreparedRow {
        cells,
        height: height + 2.0 * table.padding_y_mm,
    }
}

fn draw_row(
    table: &layout::Table,
    context: &genpdf::Context,
    area: &render::Area<'_>,
    index: usize,
    prepared: &PreparedRow,
    x0: f64,
    y: f64,
) -> Result<(), Error> {
    let row = &table.rows[index];
    let height = prepared.height;

    let mut x = x0;
    for (cell, width) in row.cells.iter().zip(&table.column_widths_mm) {
        if let Some(background) = cell.background.or(row.background) {
            fill_band(area, x, x + width, y, height, background);
        }
        x += width;
    }

    let mut x = x0;
    for ((cell, prepared_cell), width) in row
        .cells
        .iter()
        .zip(&prepared.cells)
        .zip(&table.column_widths_mm)
    {
        let text_height = prepared_cell.lines.len() as f64 * prepared_cell.line_height;
        let top = y + (height - text_height) / 2.0;
        let inner_width = width - 2.0 * table.padding_x_mm;
        for (line_index, (line, line_width)) in prepared_cell.lines.iter().enumerate() {
            let offset = match cell.alignment {
                HorizontalAlignment::Left => 0.0,
                HorizontalAlignment::Center => (inner_width - line_width) / 2.0,
                HorizontalAlignment::Right => inner_width - line_width,
            };
            let position = Position::new(
                mm_from_f64(x + table.padding_x_mm + offset.max(0.0)),
                mm_from_f64(top + line_index as f64 * prepared_cell.line_height),
            );
            area.print_str(&context.font_cache, position, prepared_cell.style, line)?;
        }
        x += width;
    }

    let table_width = table.width_mm();
    if let Some(grid) = table.grid {
        let bottom = y + height;
        stroke(area, (x0, y), (x0 + table_width, y), grid.color);
        stroke(area, (x0, bottom), (x0 + table_width, bottom), grid.color);
        let mut x = x0;
        stroke(area, (x, y), (x, bottom), grid.color);
        for width in &table.column_widths_mm {
            x += width;
            stroke(area, (x, y), (x, bottom), grid.color);
        }
    }
    if let Some(rule) = row.rule_above {
        let thickness = rule.thickness_mm;
        fill_band(
            area,
            x0,
            x0 + table_width,
            y - thickness / 2.0,
            thickness,
            rule.color,
        );
    }

    Ok(())
}

/// Paints the band `top..top + height` between `left` and `right` with horizontal strokes.
fn fill_band(area: &render::Area<'_>, left: f64, right: f64, top: f64, height: f64, rgb: Rgb) {
    for offset in stroke_offsets(top, height) {
        stroke(area, (left, offset), (right, offset), rgb);
    }
}

fn stroke(area: &render::Area<'_>, from: (f64, f64), to: (f64, f64), rgb: Rgb) {
    area.draw_line(
        vec![
            Position::new(mm_from_f64(from.0), mm_from_f64(from.1)),
            Position::new(mm_from_f64(to.0), mm_from_f64(to.1)),
        ],
        Style::new().with_color(color(rgb)),
    );
}

impl Element for TableElement {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let available_width = mm_to_f64(area.size().width);
        let available_height = mm_to_f64(area.size().height);
        let table = &self.table;
        let table_width = table.width_mm();
        let x0 = match table.placement {
            Placement::Leading => 0.0,
            Placement::Trailing => (available_width - table_width).max(0.0),
        };

        let fill = self
            .cursor
            .fill_page(table.rows.len(), available_height, |index| {
                let row = prepare_row(table, context, style, index);
                (row.height, row)
            });
        let fill = match fill {
            Ok(fill) => fill,
            Err(row) => {
                self.overflow.record(row);
                return Err(Error::new(
                    format!("Table row {} does not fit on an empty page", row),
                    ErrorKind::PageSizeExceeded,
                ));
            }
        };

        let first = self.cursor.next_row - fill.rows.len();
        let mut y = 0.0;
        for (offset, prepared) in fill.rows.iter().enumerate() {
            draw_row(table, context, &area, first + offset, prepared, x0, y)?;
            y += prepared.height;
        }

        if fill.has_more {
            self.overflow.record(self.cursor.next_row);
        } else {
            self.overflow.clear();
        }

        let mut result = RenderResult::default();
        result.has_more = fill.has_more;
        result.size = Size::new(
            mm_from_f64(x0 + table_width.min(available_width)),
            mm_from_f64(y),
        );
        Ok(result)
    }
}

/// Fixed vertical gap between flow elements.
pub struct VerticalSpace {
    height_mm: f64,
}

impl VerticalSpace {
    pub fn new(height_mm: f64) -> Self {
        Self { height_mm }
    }
}

impl Element for VerticalSpace {
    fn render(
        &mut self,
        _context: &genpdf::Context,
        area: render::Area<'_>,
        _style: Style,
    ) -> Result<RenderResult, Error> {
        let height = self.height_mm.min(mm_to_f64(area.size().height));
        let mut result = RenderResult::default();
        result.size = Size::new(0, mm_from_f64(height));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One unit per character keeps widths easy to reason about.
    fn chars(s: &str) -> f64 {
        s.chars().count() as f64
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("Calle Mayor 12, Madrid", 12.0, chars);
        assert_eq!(lines, ["Calle Mayor", "12, Madrid"]);
    }

    #[test]
    fn short_text_stays_on_one_line() {
        assert_eq!(wrap_text("Support", 40.0, chars), ["Support"]);
    }

    #[test]
    fn overlong_word_is_broken_at_characters() {
        assert_eq!(wrap_text("abcdefghij", 4.0, chars), ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn overlong_word_starts_on_a_fresh_line() {
        let lines = wrap_text("a verylongemailaddress@example.com b", 10.0, chars);
        assert_eq!(
            lines,
            ["a", "verylongem", "ailaddress", "@example.c", "om b"]
        );
        assert!(lines.iter().all(|line| chars(line) <= 10.0));
    }

    #[test]
    fn broken_words_respect_multibyte_characters() {
        assert_eq!(wrap_text("ñññññ", 2.0, chars), ["ññ", "ññ", "ñ"]);
    }

    #[test]
    fn empty_text_yields_one_blank_line() {
        assert_eq!(wrap_text("", 10.0, chars), [""]);
    }

    #[test]
    fn explicit_newlines_start_new_lines() {
        assert_eq!(wrap_text("one\ntwo", 40.0, chars), ["one", "two"]);
    }

    #[test]
    fn strokes_cover_the_whole_band() {
        let offsets = stroke_offsets(10.0, 6.0);
        let half = STROKE_WIDTH_MM / 2.0;
        assert!((offsets[0] - half - 10.0).abs() < 1e-9);
        assert!((offsets[offsets.len() - 1] + half - 16.0).abs() < 1e-9);
        assert!(offsets
            .windows(2)
            .all(|pair| pair[1] - pair[0] <= FILL_PITCH_MM + 1e-9));
    }

    #[test]
    fn thin_band_is_a_single_stroke() {
        let offsets = stroke_offsets(4.0, 0.2);
        assert_eq!(offsets.len(), 1);
        assert!((offsets[0] - 4.1).abs() < 1e-9);
    }

    #[test]
    fn two_point_rule_uses_several_strokes() {
        let thickness = 2.0 * 25.4 / 72.0;
        assert!(stroke_offsets(0.0, thickness).len() >= 3);
    }

    fn heights(values: &'static [f64]) -> impl FnMut(usize) -> (f64, usize) {
        move |index| (values[index], index)
    }

    #[test]
    fn pages_receive_whole_rows_only() {
        const ROWS: &[f64] = &[10.0, 12.0, 10.0, 15.0, 10.0];
        let mut cursor = RowCursor::default();

        let page = cursor.fill_page(ROWS.len(), 25.0, heights(ROWS)).expect("page 1");
        assert_eq!(page.rows, [0, 1]);
        assert!(page.has_more);

        let page = cursor.fill_page(ROWS.len(), 25.0, heights(ROWS)).expect("page 2");
        assert_eq!(page.rows, [2, 3]);
        assert!(page.has_more);

        let page = cursor.fill_page(ROWS.len(), 25.0, heights(ROWS)).expect("page 3");
        assert_eq!(page.rows, [4]);
        assert!(!page.has_more);
    }

    #[test]
    fn partly_used_page_defers_the_row() {
        const ROWS: &[f64] = &[20.0];
        let mut cursor = RowCursor::default();

        let page = cursor.fill_page(ROWS.len(), 5.0, heights(ROWS)).expect("short area");
        assert!(page.rows.is_empty());
        assert!(page.has_more);

        let page = cursor.fill_page(ROWS.len(), 30.0, heights(ROWS)).expect("fresh page");
        assert_eq!(page.rows, [0]);
        assert!(!page.has_more);
    }

    #[test]
    fn row_taller_than_a_page_is_reported() {
        const ROWS: &[f64] = &[10.0, 50.0];
        let mut cursor = RowCursor::default();

        let page = cursor.fill_page(ROWS.len(), 30.0, heights(ROWS)).expect("page 1");
        assert_eq!(page.rows, [0]);
        let page = cursor.fill_page(ROWS.len(), 30.0, heights(ROWS)).expect("page 2");
        assert!(page.rows.is_empty());
        assert_eq!(
            cursor.fill_page(ROWS.len(), 30.0, heights(ROWS)).err(),
            Some(1)
        );
    }

    #[test]
    fn millimetre_conversion_is_lossless() {
        assert_eq!(mm_to_f64(mm_from_f64(12.5)), 12.5);
    }

    #[test]
    fn overflow_slot_is_shared_between_clones() {
        let overflow = RowOverflow::default();
        let handle = overflow.clone();
        assert_eq!(overflow.get(), None);
        handle.record(3);
        assert_eq!(overflow.get(), Some(3));
        handle.clear();
        assert_eq!(overflow.get(), None);
    }
}
