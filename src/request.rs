//! Report request types and validation.
//!
//! The wire shape accepted by [`ReportRequest::from_json`] mirrors the JSON
//! the HTTP layer receives: a `reports` list of section names, an optional
//! `filters` object, and an `options` object carrying the output format and
//! visual toggles.  Unknown section names and unknown formats fail parsing,
//! so requests are rejected before any record-store work starts.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ReportError;

/// One independently selectable report topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    TaskSummary,
    OverdueTasks,
    StaffPerformance,
    SparePartsUsage,
    DepartmentLoad,
    CompletionTrend,
    Compliance,
}

impl SectionKind {
    /// Every section kind, in default presentation order.
    pub const ALL: [SectionKind; 7] = [
        Self::TaskSummary,
        Self::OverdueTasks,
        Self::StaffPerformance,
        Self::SparePartsUsage,
        Self::DepartmentLoad,
        Self::CompletionTrend,
        Self::Compliance,
    ];

    /// Section title as printed in documents and used for sheet names.
    pub fn title(self) -> &'static str {
        match self {
            Self::TaskSummary => "Task Summary",
            Self::OverdueTasks => "Overdue Tasks",
            Self::StaffPerformance => "Staff Performance",
            Self::SparePartsUsage => "Spare Parts Usage",
            Self::DepartmentLoad => "Department Load",
            Self::CompletionTrend => "Completion Trend",
            Self::Compliance => "Compliance Overview",
        }
    }
}

/// Supported output document formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Xlsx,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Raw record filter attached to a request.
///
/// Empty lists impose no restriction.  All active fields are combined with
/// AND semantics during normalization.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub departments: Vec<String>,
    pub categories: Vec<String>,
    pub staff: Option<String>,
}

/// Visual toggles for a request.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualOptions {
    /// Rasterize charts for the sections that define one.
    pub charts: bool,
    /// Include the request-metadata summary block in paginated output.
    pub summary: bool,
}

impl Default for VisualOptions {
    fn default() -> Self {
        Self {
            charts: false,
            summary: true,
        }
    }
}

/// A fully parsed report request.
#[derive(Clone, Debug)]
pub struct ReportRequest {
    pub sections: Vec<SectionKind>,
    pub filters: Filter,
    pub format: OutputFormat,
    pub visuals: VisualOptions,
    pub requested_by: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    reports: Vec<SectionKind>,
    #[serde(default)]
    filters: Filter,
    options: WireOptions,
    #[serde(default)]
    requested_by: Option<String>,
}

#[derive(Deserialize)]
struct WireOptions {
    format: OutputFormat,
    #[serde(default)]
    visuals: VisualOptions,
}

impl ReportRequest {
    /// Builds a request programmatically with default visuals.
    pub fn new(sections: Vec<SectionKind>, filters: Filter, format: OutputFormat) -> Self {
        Self {
            sections,
            filters,
            format,
            visuals: VisualOptions::default(),
            requested_by: None,
        }
    }

    /// Parses the external JSON wire shape and validates the result.
    pub fn from_json(payload: &str) -> Result<Self, ReportError> {
        let wire: WireRequest = serde_json::from_str(payload)
            .map_err(|err| ReportError::validation(err.to_string()))?;
        let request = Self {
            sections: wire.reports,
            filters: wire.filters,
            format: wire.options.format,
            visuals: wire.options.visuals,
            requested_by: wire.requested_by,
        };
        request.validate()?;
        Ok(request)
    }

    /// Checks the invariants that must hold before any store query runs.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.sections.is_empty() {
            return Err(ReportError::validation(
                "at least one report section must be selected",
            ));
        }
        if let (Some(from), Some(to)) = (self.filters.date_from, self.filters.date_to) {
            if from > to {
                return Err(ReportError::validation(format!(
                    "date range start {from} is after end {to}"
                )));
            }
        }
        Ok(())
    }

    /// Requested sections with duplicates removed, first occurrence wins.
    pub fn unique_sections(&self) -> Vec<SectionKind> {
        let mut seen = Vec::with_capacity(self.sections.len());
        for kind in &self.sections {
            if !seen.contains(kind) {
                seen.push(*kind);
            }
        }
        seen
    }
}
