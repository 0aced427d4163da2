use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("input exceeds the {resource} ceiling ({actual} > {limit})")]
    CeilingExceeded {
        resource: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("no pages available after applying selection")]
    NoPagesSelected,
}

impl ConvertError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
