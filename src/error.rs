//! Error taxonomy for report generation.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the report engine.
///
/// Validation errors are raised before any record-store work begins.  Store
/// errors abort the whole request; no partial file is written.  Chart
/// degradation is deliberately *not* represented here because an absent chart
/// image is a valid result, not a failure.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The request was rejected before any aggregation work started.
    #[error("invalid report request: {0}")]
    Validation(String),

    /// A record-store query failed while aggregating.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Laying out or serializing the output document failed.
    #[error("failed to produce {format} output: {message}")]
    Render {
        format: &'static str,
        message: String,
    },

    /// Writing the finished document to disk failed.
    #[error("failed to write report file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn render(format: &'static str, message: impl fmt::Display) -> Self {
        Self::Render {
            format,
            message: message.to_string(),
        }
    }
}
