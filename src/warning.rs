use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    PageDecodeFailure,
    RowRejected,
    OrphanContinuation,
    ClassificationMismatch,
    OpeningBalanceDisagreement,
    CarriedBalanceDisagreement,
    NoTransactionsDetected,
}

impl WarningCode {
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::RowRejected | Self::OrphanContinuation => Severity::Low,
            Self::PageDecodeFailure
            | Self::ClassificationMismatch
            | Self::OpeningBalanceDisagreement
            | Self::CarriedBalanceDisagreement
            | Self::NoTransactionsDetected => Severity::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertWarning {
    pub code: WarningCode,
    pub message: String,
    pub page: Option<u32>,
    pub line: Option<usize>,
    pub sequence_index: Option<usize>,
}

impl ConvertWarning {
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            page: None,
            line: None,
            sequence_index: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_sequence_index(mut self, sequence_index: usize) -> Self {
        self.sequence_index = Some(sequence_index);
        self
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}
