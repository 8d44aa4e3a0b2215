//! Paginated print output.
//!
//! [`PdfWriter`] owns a layout cursor and a fixed page geometry for the
//! lifetime of one document.  Every drawing operation reserves the vertical
//! space it needs first; when the space is not available the writer stamps a
//! footer on the current page, allocates a new page and resets the cursor
//! before drawing, so content never bleeds into the bottom margin.  All
//! fonts and styles are fields of the instance, never process-wide state, so
//! concurrent report generations stay isolated.

use printpdf::image_crate::{self, GenericImageView};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Image as PdfImage, ImageTransform, IndirectFontRef, Line, Mm,
    PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point,
    Polygon, Rgb,
};

use crate::error::ReportError;
use crate::generator::{
    chart_caption, section_tables, summary_fields, DocumentWriter, ReportContent,
};

const PT_TO_MM: f64 = 25.4 / 72.0;
const MM_PER_INCH: f64 = 25.4;
const DEFAULT_IMAGE_DPI: f64 = 300.0;

const LINE_SPACING: f64 = 1.45;
const BASELINE_RATIO: f64 = 0.78;
const CELL_PADDING_MM: f64 = 1.8;
const RULE_GAP_MM: f64 = 2.5;
const SECTION_GAP_MM: f64 = 7.0;
const IMAGE_GAP_MM: f64 = 3.0;
const FOOTER_FONT_PT: f64 = 8.0;
const TABLE_FONT_PT: f64 = 9.0;

/// Fixed page dimensions and margins, in millimetres.
#[derive(Clone, Copy, Debug)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    /// Vertical band above the bottom margin reserved for the footer.
    pub footer_band: f64,
}

impl PageGeometry {
    pub fn a4() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin: 15.0,
            footer_band: 10.0,
        }
    }

    /// Horizontal space available to content.
    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    fn top(&self) -> f64 {
        self.height - self.margin
    }

    /// Lowest y content may reach before a page break is required.
    fn floor(&self) -> f64 {
        self.margin + self.footer_band
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

/// Inline style for paragraphs.
#[derive(Clone, Copy, Debug)]
pub struct TextStyle {
    pub size: f64,
    pub bold: bool,
    pub muted: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 10.0,
            bold: false,
            muted: false,
        }
    }
}

/// Current drawing position.  `y` is the distance from the bottom page edge,
/// decreasing as content flows down the page.
#[derive(Clone, Copy, Debug)]
struct LayoutCursor {
    page: usize,
    x: f64,
    y: f64,
}

struct PageState {
    page: PdfPageIndex,
    layer: PdfLayerIndex,
    footer_done: bool,
}

/// Scales requested column widths down by a single ratio whenever their sum
/// exceeds the content width, so a table always fits horizontally without
/// changing its column count.
pub fn normalize_widths(widths: &[f64], content_width: f64) -> Vec<f64> {
    let sum: f64 = widths.iter().sum();
    if sum <= content_width || sum <= 0.0 {
        return widths.to_vec();
    }
    let ratio = content_width / sum;
    widths.iter().map(|w| w * ratio).collect()
}

fn line_height(font_size: f64) -> f64 {
    font_size * PT_TO_MM * LINE_SPACING
}

fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

/// Converts a layout-space millimetre value (tracked as `f64` for precision
/// across many accumulated additions) to the `f32` the printpdf API expects.
fn mm(value: f64) -> Mm {
    Mm(value as f32)
}

fn text_color() -> Color {
    rgb(0x1f, 0x29, 0x37)
}

fn muted_color() -> Color {
    rgb(0x6b, 0x72, 0x80)
}

fn rule_color() -> Color {
    rgb(0xc9, 0xd0, 0xd9)
}

fn header_tint() -> Color {
    rgb(0xdb, 0xe4, 0xf0)
}

fn zebra_tint() -> Color {
    rgb(0xf3, 0xf4, 0xf6)
}

/// Helvetica has no metrics table we consult; half an em per glyph is close
/// enough for footers and cell fitting.
fn approx_text_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * 0.5 * PT_TO_MM
}

/// Truncates `text` with an ellipsis so it fits `available` millimetres.
fn fit_cell(text: &str, available: f64, font_size: f64) -> String {
    let char_width = font_size * 0.5 * PT_TO_MM;
    let max_chars = (available / char_width).floor() as usize;
    if max_chars == 0 {
        return String::new();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn filled_rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
    let ring = vec![
        (Point::new(mm(x0), mm(y0)), false),
        (Point::new(mm(x1), mm(y0)), false),
        (Point::new(mm(x1), mm(y1)), false),
        (Point::new(mm(x0), mm(y1)), false),
    ];
    Polygon {
        rings: vec![ring],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    }
}

/// Cursor-driven writer for the paginated print document.
pub struct PdfWriter {
    doc: PdfDocumentReference,
    pages: Vec<PageState>,
    cursor: LayoutCursor,
    geometry: PageGeometry,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    footer_note: String,
}

impl PdfWriter {
    /// Allocates page 1 with the cursor at the top-left content origin.
    pub fn new(
        title: &str,
        footer_note: impl Into<String>,
        geometry: PageGeometry,
    ) -> Result<Self, ReportError> {
        let (doc, page, layer) =
            PdfDocument::new(title, mm(geometry.width), mm(geometry.height), "content");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::render("pdf", e))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::render("pdf", e))?;
        let cursor = LayoutCursor {
            page: 0,
            x: geometry.margin,
            y: geometry.top(),
        };
        Ok(Self {
            doc,
            pages: vec![PageState {
                page,
                layer,
                footer_done: false,
            }],
            cursor,
            geometry,
            regular,
            bold,
            footer_note: footer_note.into(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn layer_for(&self, index: usize) -> PdfLayerReference {
        let state = &self.pages[index];
        self.doc.get_page(state.page).get_layer(state.layer)
    }

    fn layer(&self) -> PdfLayerReference {
        self.layer_for(self.cursor.page)
    }

    fn remaining(&self) -> f64 {
        self.cursor.y - self.geometry.floor()
    }

    fn at_page_top(&self) -> bool {
        (self.geometry.top() - self.cursor.y).abs() < 0.01
    }

    /// Pages before drawing when `needed` millimetres are not available.  A
    /// fresh page is never broken again, so oversized content starts cleanly
    /// at the top and flows from there.
    fn ensure_space(&mut self, needed: f64) {
        if self.remaining() < needed && !self.at_page_top() {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        self.stamp_footer(self.cursor.page);
        let number = self.pages.len() + 1;
        let (page, layer) = self.doc.add_page(
            mm(self.geometry.width),
            mm(self.geometry.height),
            format!("page {number}"),
        );
        self.pages.push(PageState {
            page,
            layer,
            footer_done: false,
        });
        self.cursor.page = self.pages.len() - 1;
        self.cursor.x = self.geometry.margin;
        self.cursor.y = self.geometry.top();
    }

    /// Draws the footer once per page; later calls for the same page are
    /// no-ops, so the defensive sweep in [`finish`](Self::finish) never
    /// double-draws.
    fn stamp_footer(&mut self, index: usize) {
        if self.pages[index].footer_done {
            return;
        }
        self.pages[index].footer_done = true;

        let geometry = self.geometry;
        let layer = self.layer_for(index);
        let rule_y = geometry.floor();
        layer.set_outline_color(rule_color());
        layer.set_outline_thickness(0.4);
        layer.add_line(Line {
            points: vec![
                (Point::new(mm(geometry.margin), mm(rule_y)), false),
                (
                    Point::new(mm(geometry.width - geometry.margin), mm(rule_y)),
                    false,
                ),
            ],
            is_closed: false,
        });

        let text_y = geometry.margin + geometry.footer_band * 0.3;
        layer.set_fill_color(muted_color());
        layer.use_text(
            self.footer_note.as_str(),
            FOOTER_FONT_PT as f32,
            mm(geometry.margin),
            mm(text_y),
            &self.regular,
        );
        let page_label = format!("Page {}", index + 1);
        let label_width = approx_text_width(&page_label, FOOTER_FONT_PT);
        layer.use_text(
            page_label,
            FOOTER_FONT_PT as f32,
            mm(geometry.width - geometry.margin - label_width),
            mm(text_y),
            &self.regular,
        );
    }

    /// Draws a bold heading.  Level 1 is the document title size, level 2 a
    /// section title, anything deeper a sub-title.
    pub fn heading(&mut self, text: &str, level: u8) {
        let size = match level {
            0 | 1 => 15.0,
            2 => 12.5,
            _ => 10.5,
        };
        let after = match level {
            0 | 1 => 2.0,
            2 => 1.5,
            _ => 1.0,
        };
        let height = line_height(size);
        self.ensure_space(height + after);
        let layer = self.layer();
        layer.set_fill_color(text_color());
        layer.use_text(
            text,
            size as f32,
            mm(self.cursor.x),
            mm(self.cursor.y - height * BASELINE_RATIO),
            &self.bold,
        );
        self.cursor.y -= height + after;
    }

    /// Draws a single line of text at the cursor and advances past it.
    pub fn paragraph(&mut self, text: &str, style: TextStyle) {
        let height = line_height(style.size);
        self.ensure_space(height);
        let font = if style.bold { &self.bold } else { &self.regular };
        let layer = self.layer();
        layer.set_fill_color(if style.muted {
            muted_color()
        } else {
            text_color()
        });
        layer.use_text(
            text,
            style.size as f32,
            mm(self.cursor.x),
            mm(self.cursor.y - height * BASELINE_RATIO),
            font,
        );
        self.cursor.y -= height;
    }

    /// Draws a horizontal divider across the content width.
    pub fn rule(&mut self) {
        self.ensure_space(RULE_GAP_MM);
        let layer = self.layer();
        layer.set_outline_color(rule_color());
        layer.set_outline_thickness(0.4);
        layer.add_line(Line {
            points: vec![
                (Point::new(mm(self.cursor.x), mm(self.cursor.y)), false),
                (
                    Point::new(
                        mm(self.cursor.x + self.geometry.content_width()),
                        mm(self.cursor.y),
                    ),
                    false,
                ),
            ],
            is_closed: false,
        });
        self.cursor.y -= RULE_GAP_MM;
    }

    /// Advances by the inter-section gap, paging instead when the gap would
    /// cross into the footer band.
    pub fn section_gap(&mut self) {
        if self.remaining() < SECTION_GAP_MM {
            if !self.at_page_top() {
                self.break_page();
            }
        } else {
            self.cursor.y -= SECTION_GAP_MM;
        }
    }

    /// Draws a table whose first row is the header.  Column widths are
    /// normalized to the content width; the whole table's height is reserved
    /// up front, and a table too tall for one page breaks before any row
    /// that no longer fits.
    pub fn table(&mut self, rows: &[Vec<String>], widths: &[f64], font_size: f64) {
        if rows.is_empty() {
            return;
        }
        let widths = normalize_widths(widths, self.geometry.content_width());
        let row_height = font_size * PT_TO_MM * 1.7;
        let total_height = row_height * rows.len() as f64;
        self.ensure_space(total_height);

        for (index, row) in rows.iter().enumerate() {
            if self.remaining() < row_height && !self.at_page_top() {
                self.break_page();
            }
            let header = index == 0;
            let tint = if header {
                Some(header_tint())
            } else if (index - 1) % 2 == 0 {
                Some(zebra_tint())
            } else {
                None
            };
            self.table_row(row, &widths, font_size, row_height, tint, header);
        }
    }

    fn table_row(
        &mut self,
        cells: &[String],
        widths: &[f64],
        font_size: f64,
        row_height: f64,
        tint: Option<Color>,
        bold: bool,
    ) {
        let top = self.cursor.y;
        let table_width: f64 = widths.iter().sum();
        let layer = self.layer();
        if let Some(tint) = tint {
            layer.set_fill_color(tint);
            layer.add_polygon(filled_rect(
                self.cursor.x,
                top - row_height,
                self.cursor.x + table_width,
                top,
            ));
        }
        layer.set_fill_color(text_color());
        let font = if bold { &self.bold } else { &self.regular };
        let mut x = self.cursor.x;
        for (cell, width) in cells.iter().zip(widths) {
            let text = fit_cell(cell, width - 2.0 * CELL_PADDING_MM, font_size);
            layer.use_text(
                text,
                font_size as f32,
                mm(x + CELL_PADDING_MM),
                mm(top - row_height * 0.72),
                font,
            );
            x += width;
        }
        self.cursor.y -= row_height;
    }

    /// Embeds a raster image scaled down (never up) to the content width,
    /// with an optional caption above it.  Absent bytes are a no-op so a
    /// degraded chart simply leaves no trace.
    pub fn image(&mut self, bytes: Option<&[u8]>, caption: Option<&str>) -> Result<(), ReportError> {
        let Some(bytes) = bytes else {
            return Ok(());
        };
        let decoded =
            image_crate::load_from_memory(bytes).map_err(|e| ReportError::render("pdf", e))?;
        let (px_width, px_height) = decoded.dimensions();
        if px_width == 0 || px_height == 0 {
            return Ok(());
        }
        let natural_width = f64::from(px_width) * MM_PER_INCH / DEFAULT_IMAGE_DPI;
        let natural_height = f64::from(px_height) * MM_PER_INCH / DEFAULT_IMAGE_DPI;
        let scale = (self.geometry.content_width() / natural_width).min(1.0);
        let display_height = natural_height * scale;
        let caption_height = caption.map(|_| line_height(10.5) + 1.0).unwrap_or(0.0);
        self.ensure_space(caption_height + display_height + IMAGE_GAP_MM);

        if let Some(caption) = caption {
            self.heading(caption, 3);
        }
        let bottom = self.cursor.y - display_height;
        let image = PdfImage::from_dynamic_image(&decoded);
        image.add_to_layer(
            self.layer(),
            ImageTransform {
                translate_x: Some(mm(self.cursor.x)),
                translate_y: Some(mm(bottom)),
                scale_x: Some(scale as f32),
                scale_y: Some(scale as f32),
                dpi: Some(DEFAULT_IMAGE_DPI as f32),
                ..ImageTransform::default()
            },
        );
        self.cursor.y = bottom - IMAGE_GAP_MM;
        Ok(())
    }

    /// Stamps the footer on the final page, sweeps every earlier page for a
    /// missing footer, and serializes the document.
    pub fn finish(mut self) -> Result<Vec<u8>, ReportError> {
        self.stamp_footer(self.cursor.page);
        for index in 0..self.pages.len() {
            self.stamp_footer(index);
        }
        self.doc
            .save_to_bytes()
            .map_err(|e| ReportError::render("pdf", e))
    }
}

/// Paginated-document implementation of the writer contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfReportWriter {
    geometry: PageGeometry,
}

impl PdfReportWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentWriter for PdfReportWriter {
    fn render(&mut self, content: &ReportContent<'_>) -> Result<Vec<u8>, ReportError> {
        let footer = format!(
            "Biomedical maintenance report · {}",
            content.meta.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        let mut writer = PdfWriter::new("Maintenance Report", footer, self.geometry)?;

        writer.heading("Biomedical Equipment Maintenance Report", 1);
        if content.meta.include_summary {
            for (label, value) in summary_fields(content) {
                writer.paragraph(
                    &format!("{label}: {value}"),
                    TextStyle {
                        size: 9.5,
                        muted: true,
                        ..TextStyle::default()
                    },
                );
            }
        }
        writer.rule();

        for kind in content.sections {
            writer.section_gap();
            writer.heading(kind.title(), 2);

            let blocks = section_tables(*kind, content.dataset);
            let mut wrote_rows = false;
            for block in &blocks {
                if block.rows.is_empty() {
                    continue;
                }
                wrote_rows = true;
                if let Some(title) = block.title {
                    writer.heading(title, 3);
                }
                let mut rows: Vec<Vec<String>> = Vec::with_capacity(block.rows.len() + 1);
                rows.push(block.headers.iter().map(|h| h.to_string()).collect());
                rows.extend(
                    block
                        .rows
                        .iter()
                        .map(|row| row.iter().map(|cell| cell.to_string()).collect()),
                );
                writer.table(&rows, &block.widths, TABLE_FONT_PT);
            }
            if !wrote_rows {
                writer.paragraph(
                    "No matching records for this section.",
                    TextStyle {
                        size: 9.5,
                        muted: true,
                        ..TextStyle::default()
                    },
                );
            }

            if let Some(chart) = content.charts.get(kind) {
                writer.image(chart.bytes.as_deref(), Some(chart_caption(*kind)))?;
            }
        }

        writer.finish()
    }
}
