pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod normalize;
pub mod report;

pub use config::Settings;
pub use error::{ReportError, Result};
pub use export::{to_xlsx, EXPORT_FILE_NAME, EXPORT_MIME_TYPE, SHEET_NAME};
pub use fetch::SapClient;
pub use filter::{FilterKey, KeyFilter, Period, Query};
pub use normalize::{NormalizeOptions, QueryOutcome, Table};
pub use report::ReportPipeline;
