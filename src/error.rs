// src/error.rs

use reqwest::StatusCode;
use std::path::PathBuf;

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

/// Everything that can end a report query early.
///
/// `Transport` and `Remote` mean the SAP service could not be reached or
/// refused the request. `Payload`, `Json` and `Export` mean the response
/// arrived but could not be turned into a table or a workbook. An empty
/// result set is not an error; see [`crate::QueryOutcome::NoData`].
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Connection, TLS or body read failure.
    #[error("request to SAP failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with something other than 200.
    #[error("SAP returned status {status}")]
    Remote { status: StatusCode, body: String },

    /// Body is not valid JSON.
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but not the `{ d: { results: [...] } }` envelope.
    #[error("unexpected payload shape: {0}")]
    Payload(String),

    #[error("failed to build spreadsheet: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    /// The workbook was built but could not be written out.
    #[error("writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid period {month:02}/{year}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ReportError {
    /// True when the failure happened on the way to or at the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(self, ReportError::Transport(_) | ReportError::Remote { .. })
    }

    /// True when the remote call succeeded but its data could not be processed.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            ReportError::Json(_)
                | ReportError::Payload(_)
                | ReportError::Export(_)
                | ReportError::Write { .. }
        )
    }
}
