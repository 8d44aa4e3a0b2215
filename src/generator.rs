//! Report orchestration and the shared writer contract.
//!
//! Generation is one sequential batch per request: validate, aggregate,
//! rasterize charts, lay out, write to disk.  Every request gets its own
//! dataset, chart images, and writer instance; the only shared resource
//! between concurrent requests is the output directory, whose creation is
//! idempotent.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::debug;

use crate::aggregate::{self, Dataset};
use crate::charts::{ChartImage, ChartRenderer, ChartSpec, RasterChartRenderer, SeriesPoint};
use crate::error::ReportError;
use crate::filter::TaskPredicate;
use crate::pdf::PdfReportWriter;
use crate::request::{Filter, OutputFormat, ReportRequest, SectionKind};
use crate::store::RecordStore;
use crate::workbook::XlsxReportWriter;

const FILE_PREFIX: &str = "maintenance-report-";

/// Terminal descriptor of a generated report file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub mime_type: &'static str,
}

/// Request metadata carried into the writers.
pub struct ReportMeta<'a> {
    pub generated_at: DateTime<Utc>,
    pub requested_by: &'a str,
    pub filters: &'a Filter,
    pub include_summary: bool,
}

/// Everything a document writer consumes for one report.
pub struct ReportContent<'a> {
    pub sections: &'a [SectionKind],
    pub dataset: &'a Dataset,
    pub charts: &'a HashMap<SectionKind, ChartImage>,
    pub meta: ReportMeta<'a>,
}

/// Contract shared by the paginated and workbook writers.
pub trait DocumentWriter {
    fn render(&mut self, content: &ReportContent<'_>) -> Result<Vec<u8>, ReportError>;
}

/// A single tabular value, neutral to the output format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Count(u32),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Count(count) => write!(f, "{count}"),
        }
    }
}

/// One table of a section: header row, print column widths in millimetres,
/// and data rows.  Both writers consume the same blocks.
#[derive(Clone, Debug)]
pub struct TableBlock {
    pub title: Option<&'static str>,
    pub headers: Vec<&'static str>,
    pub widths: Vec<f64>,
    pub rows: Vec<Vec<Cell>>,
}

/// Projects one section's aggregates into format-neutral table blocks.
pub fn section_tables(kind: SectionKind, dataset: &Dataset) -> Vec<TableBlock> {
    match kind {
        SectionKind::TaskSummary => {
            let totals = dataset.status_totals;
            let mut blocks = vec![TableBlock {
                title: None,
                headers: vec!["Status", "Tasks"],
                widths: vec![120.0, 60.0],
                rows: vec![
                    vec![Cell::Text("Pending".to_string()), Cell::Count(totals.pending)],
                    vec![
                        Cell::Text("In Progress".to_string()),
                        Cell::Count(totals.in_progress),
                    ],
                    vec![
                        Cell::Text("Completed".to_string()),
                        Cell::Count(totals.completed),
                    ],
                    vec![
                        Cell::Text("Cancelled".to_string()),
                        Cell::Count(totals.cancelled),
                    ],
                    vec![Cell::Text("Total".to_string()), Cell::Count(totals.total())],
                ],
            }];
            if !dataset.type_totals.is_empty() {
                blocks.push(TableBlock {
                    title: Some("By task type"),
                    headers: vec!["Task type", "Tasks"],
                    widths: vec![120.0, 60.0],
                    rows: dataset
                        .type_totals
                        .iter()
                        .map(|t| vec![Cell::Text(t.label.clone()), Cell::Count(t.count)])
                        .collect(),
                });
            }
            blocks
        }
        SectionKind::OverdueTasks => vec![TableBlock {
            title: None,
            headers: vec!["Task", "Equipment", "Due date"],
            widths: vec![80.0, 55.0, 45.0],
            rows: dataset
                .overdue
                .iter()
                .map(|o| {
                    vec![
                        Cell::Text(o.description.clone()),
                        Cell::Text(o.equipment.clone()),
                        Cell::Text(o.due_date.format("%Y-%m-%d %H:%M").to_string()),
                    ]
                })
                .collect(),
        }],
        SectionKind::StaffPerformance => vec![TableBlock {
            title: None,
            headers: vec![
                "Staff",
                "Pending",
                "In Progress",
                "Completed",
                "Cancelled",
                "Total",
            ],
            widths: vec![55.0, 25.0, 25.0, 25.0, 25.0, 25.0],
            rows: dataset
                .staff
                .iter()
                .map(|s| {
                    vec![
                        Cell::Text(s.name.clone()),
                        Cell::Count(s.pending),
                        Cell::Count(s.in_progress),
                        Cell::Count(s.completed),
                        Cell::Count(s.cancelled),
                        Cell::Count(s.total),
                    ]
                })
                .collect(),
        }],
        SectionKind::SparePartsUsage => vec![TableBlock {
            title: None,
            headers: vec!["Spare part", "Qty used"],
            widths: vec![130.0, 50.0],
            rows: dataset
                .spare_parts
                .iter()
                .map(|p| vec![Cell::Text(p.part.clone()), Cell::Count(p.qty_used)])
                .collect(),
        }],
        SectionKind::DepartmentLoad => vec![TableBlock {
            title: None,
            headers: vec!["Department", "Tasks"],
            widths: vec![130.0, 50.0],
            rows: dataset
                .department_load
                .iter()
                .map(|d| vec![Cell::Text(d.department.clone()), Cell::Count(d.count)])
                .collect(),
        }],
        SectionKind::CompletionTrend => vec![TableBlock {
            title: None,
            headers: vec!["Day", "Completed"],
            widths: vec![120.0, 60.0],
            rows: dataset
                .trend
                .iter()
                .map(|t| {
                    vec![
                        Cell::Text(t.day.format("%Y-%m-%d").to_string()),
                        Cell::Count(t.completed),
                    ]
                })
                .collect(),
        }],
        SectionKind::Compliance => vec![TableBlock {
            title: None,
            headers: vec!["Requirement", "Status", "Notes"],
            widths: vec![70.0, 40.0, 70.0],
            rows: dataset
                .compliance
                .iter()
                .map(|c| {
                    vec![
                        Cell::Text(c.requirement.clone()),
                        Cell::Text(c.status.clone()),
                        Cell::Text(c.note.clone()),
                    ]
                })
                .collect(),
        }],
    }
}

/// The chart a section defines over the dataset, if any.
pub fn section_chart(kind: SectionKind, dataset: &Dataset) -> Option<ChartSpec> {
    match kind {
        SectionKind::TaskSummary => {
            let totals = dataset.status_totals;
            if totals.total() == 0 {
                return None;
            }
            Some(ChartSpec::pie(vec![
                SeriesPoint::new("Pending", f64::from(totals.pending)),
                SeriesPoint::new("In Progress", f64::from(totals.in_progress)),
                SeriesPoint::new("Completed", f64::from(totals.completed)),
                SeriesPoint::new("Cancelled", f64::from(totals.cancelled)),
            ]))
        }
        SectionKind::DepartmentLoad => {
            if dataset.department_load.is_empty() {
                return None;
            }
            Some(ChartSpec::bar(
                dataset
                    .department_load
                    .iter()
                    .map(|d| SeriesPoint::new(d.department.clone(), f64::from(d.count)))
                    .collect(),
            ))
        }
        SectionKind::CompletionTrend => {
            if dataset.trend.len() < 2 {
                return None;
            }
            Some(ChartSpec::line(
                dataset
                    .trend
                    .iter()
                    .map(|t| {
                        SeriesPoint::new(t.day.format("%Y-%m-%d").to_string(), f64::from(t.completed))
                    })
                    .collect(),
            ))
        }
        _ => None,
    }
}

/// Caption printed above a section's chart.
pub fn chart_caption(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::TaskSummary => "Status distribution",
        SectionKind::DepartmentLoad => "Tasks by department",
        SectionKind::CompletionTrend => "Completions per day",
        _ => "Chart",
    }
}

/// Request metadata as label/value pairs, shared by the PDF summary block and
/// the workbook Summary sheet.
pub fn summary_fields(content: &ReportContent<'_>) -> Vec<(String, String)> {
    let meta = &content.meta;
    let mut fields = vec![
        (
            "Generated".to_string(),
            meta.generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        ),
        ("Requested by".to_string(), meta.requested_by.to_string()),
        (
            "Sections".to_string(),
            content
                .sections
                .iter()
                .map(|s| s.title())
                .collect::<Vec<_>>()
                .join(", "),
        ),
    ];
    let range = match (meta.filters.date_from, meta.filters.date_to) {
        (Some(from), Some(to)) => format!(
            "{} to {}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        ),
        (Some(from), None) => format!("from {}", from.format("%Y-%m-%d")),
        (None, Some(to)) => format!("until {}", to.format("%Y-%m-%d")),
        (None, None) => "all dates".to_string(),
    };
    fields.push(("Date range".to_string(), range));
    if !meta.filters.departments.is_empty() {
        fields.push((
            "Departments".to_string(),
            meta.filters.departments.join(", "),
        ));
    }
    if !meta.filters.categories.is_empty() {
        fields.push(("Categories".to_string(), meta.filters.categories.join(", ")));
    }
    if let Some(staff) = &meta.filters.staff {
        fields.push(("Staff".to_string(), staff.clone()));
    }
    fields
}

/// Report generation facade.
///
/// Owns the record-store handle, the injected chart capability, and the
/// output directory.  Each call to [`generate`](Self::generate) allocates its
/// own dataset, chart images, and writer instance.
pub struct ReportEngine<S> {
    store: S,
    charts: Box<dyn ChartRenderer>,
    output_dir: PathBuf,
}

impl<S: RecordStore> ReportEngine<S> {
    pub fn new(store: S, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            charts: Box::new(RasterChartRenderer::new()),
            output_dir: output_dir.into(),
        }
    }

    /// Replaces the chart capability, e.g. with [`crate::charts::NullChartRenderer`].
    pub fn with_chart_renderer(mut self, charts: Box<dyn ChartRenderer>) -> Self {
        self.charts = charts;
        self
    }

    /// Generates one report and writes it to the output directory.
    pub fn generate(&self, request: &ReportRequest) -> Result<ReportArtifact, ReportError> {
        request.validate()?;
        fs::create_dir_all(&self.output_dir).map_err(|source| ReportError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let now = Utc::now();
        let sections = request.unique_sections();
        let predicate = TaskPredicate::normalize(&request.filters);
        let dataset = aggregate::build_dataset(&self.store, &predicate, &sections, now)?;

        let mut charts = HashMap::new();
        if request.visuals.charts {
            for kind in &sections {
                if let Some(spec) = section_chart(*kind, &dataset) {
                    charts.insert(*kind, self.charts.render(spec));
                }
            }
        }

        let content = ReportContent {
            sections: &sections,
            dataset: &dataset,
            charts: &charts,
            meta: ReportMeta {
                generated_at: now,
                requested_by: request.requested_by.as_deref().unwrap_or("system"),
                filters: &request.filters,
                include_summary: request.visuals.summary,
            },
        };

        let mut writer: Box<dyn DocumentWriter> = match request.format {
            OutputFormat::Pdf => Box::new(PdfReportWriter::new()),
            OutputFormat::Xlsx => Box::new(XlsxReportWriter::new()),
        };
        let bytes = writer.render(&content)?;

        let filename = format!(
            "{FILE_PREFIX}{}.{}",
            now.timestamp_millis(),
            request.format.extension()
        );
        let path = self.output_dir.join(&filename);
        fs::write(&path, &bytes).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        let path = path.canonicalize().unwrap_or(path);
        debug!(
            "wrote {} report {} ({} bytes)",
            request.format.extension(),
            path.display(),
            bytes.len()
        );

        Ok(ReportArtifact {
            filename,
            path,
            mime_type: request.format.mime_type(),
        })
    }
}
