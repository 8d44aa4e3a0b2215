//! Multi-sheet workbook output.
//!
//! Workbook layout is cell-indexed rather than cursor-driven: every section
//! gets its own sheet, written independently, and an always-present Summary
//! sheet records the request metadata.  Chart images are anchored past the
//! data columns so they never overlap the table.

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Image, Workbook, XlsxError};

use crate::error::ReportError;
use crate::generator::{section_tables, summary_fields, Cell, DocumentWriter, ReportContent};
use crate::request::SectionKind;

fn xl(err: XlsxError) -> ReportError {
    ReportError::render("xlsx", err)
}

/// Reusable cell formats.
struct SheetFormats {
    header: Format,
    text: Format,
    integer: Format,
    label: Format,
}

impl SheetFormats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0x4472C4)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);
        let text = Format::new().set_border(FormatBorder::Thin);
        let integer = Format::new()
            .set_num_format("#,##0")
            .set_border(FormatBorder::Thin);
        let label = Format::new().set_bold();
        Self {
            header,
            text,
            integer,
            label,
        }
    }
}

/// Workbook implementation of the writer contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct XlsxReportWriter;

impl XlsxReportWriter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentWriter for XlsxReportWriter {
    fn render(&mut self, content: &ReportContent<'_>) -> Result<Vec<u8>, ReportError> {
        let mut workbook = Workbook::new();
        let formats = SheetFormats::new();
        write_summary_sheet(&mut workbook, content, &formats)?;
        for kind in content.sections {
            write_section_sheet(&mut workbook, *kind, content, &formats)?;
        }
        workbook.save_to_buffer().map_err(xl)
    }
}

fn write_summary_sheet(
    workbook: &mut Workbook,
    content: &ReportContent<'_>,
    formats: &SheetFormats,
) -> Result<(), ReportError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name("Summary").map_err(xl)?;
    for (row, (label, value)) in summary_fields(content).iter().enumerate() {
        sheet
            .write_with_format(row as u32, 0, label.as_str(), &formats.label)
            .map_err(xl)?;
        sheet
            .write_with_format(row as u32, 1, value.as_str(), &formats.text)
            .map_err(xl)?;
    }
    sheet.set_column_width(0, 18).ok();
    sheet.set_column_width(1, 60).ok();
    Ok(())
}

fn write_section_sheet(
    workbook: &mut Workbook,
    kind: SectionKind,
    content: &ReportContent<'_>,
    formats: &SheetFormats,
) -> Result<(), ReportError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(kind.title()).map_err(xl)?;

    let mut row: u32 = 0;
    let mut max_columns: u16 = 0;
    for block in section_tables(kind, content.dataset) {
        if let Some(title) = block.title {
            sheet
                .write_with_format(row, 0, title, &formats.label)
                .map_err(xl)?;
            row += 1;
        }
        for (col, header) in block.headers.iter().enumerate() {
            sheet
                .write_with_format(row, col as u16, *header, &formats.header)
                .map_err(xl)?;
        }
        max_columns = max_columns.max(block.headers.len() as u16);
        row += 1;
        for cells in &block.rows {
            for (col, cell) in cells.iter().enumerate() {
                match cell {
                    Cell::Text(text) => sheet
                        .write_with_format(row, col as u16, text.as_str(), &formats.text)
                        .map_err(xl)?,
                    Cell::Count(count) => sheet
                        .write_with_format(row, col as u16, *count, &formats.integer)
                        .map_err(xl)?,
                };
            }
            row += 1;
        }
        // Blank spacer row between blocks.
        row += 1;
    }

    sheet.set_column_width(0, 32).ok();
    for col in 1..max_columns {
        sheet.set_column_width(col, 16).ok();
    }
    sheet.set_freeze_panes(1, 0).ok();

    if let Some(chart) = content.charts.get(&kind) {
        if let Some(bytes) = &chart.bytes {
            let image = Image::new_from_buffer(bytes).map_err(xl)?;
            sheet.insert_image(1, max_columns + 1, &image).map_err(xl)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{self, Dataset};
    use crate::charts::{ChartImage, ChartKind};
    use crate::filter::TaskPredicate;
    use crate::generator::ReportMeta;
    use crate::request::Filter;
    use crate::store::{MaintenanceTask, MemoryStore, TaskStatus};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn sample_dataset() -> Dataset {
        let created = Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap();
        let store = MemoryStore::new().with_task(MaintenanceTask {
            id: "t1".to_string(),
            description: "Swap oxygen sensor".to_string(),
            task_type: Some("Corrective".to_string()),
            status: TaskStatus::Completed,
            equipment_id: None,
            assigned_to: None,
            created_at: created,
            due_date: None,
            parts_used: Vec::new(),
        });
        aggregate::build_dataset(
            &store,
            &TaskPredicate::normalize(&Filter::default()),
            &crate::request::SectionKind::ALL,
            created + chrono::Duration::days(10),
        )
        .unwrap()
    }

    #[test]
    fn renders_a_zip_container_with_all_sections() {
        let dataset = sample_dataset();
        let filters = Filter::default();
        let charts = HashMap::new();
        let content = ReportContent {
            sections: &crate::request::SectionKind::ALL,
            dataset: &dataset,
            charts: &charts,
            meta: ReportMeta {
                generated_at: Utc.with_ymd_and_hms(2026, 4, 20, 8, 0, 0).unwrap(),
                requested_by: "qa",
                filters: &filters,
                include_summary: true,
            },
        };

        let bytes = XlsxReportWriter::new().render(&content).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn absent_chart_bytes_are_skipped() {
        let dataset = sample_dataset();
        let filters = Filter::default();
        let mut charts = HashMap::new();
        charts.insert(
            crate::request::SectionKind::TaskSummary,
            ChartImage {
                kind: ChartKind::Pie,
                bytes: None,
                width: 420,
                height: 420,
            },
        );
        let content = ReportContent {
            sections: &[crate::request::SectionKind::TaskSummary],
            dataset: &dataset,
            charts: &charts,
            meta: ReportMeta {
                generated_at: Utc.with_ymd_and_hms(2026, 4, 20, 8, 0, 0).unwrap(),
                requested_by: "qa",
                filters: &filters,
                include_summary: true,
            },
        };

        assert!(XlsxReportWriter::new().render(&content).is_ok());
    }

    #[test]
    fn sheet_names_stay_within_the_workbook_limit() {
        for kind in crate::request::SectionKind::ALL {
            assert!(kind.title().len() <= 31);
        }
    }
}
