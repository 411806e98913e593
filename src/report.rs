// src/report.rs

use crate::error::Result;
use crate::fetch::{into_body, RawResponse, SapClient};
use crate::filter::Query;
use crate::normalize::{normalize, NormalizeOptions, QueryOutcome};
use reqwest::StatusCode;
use tracing::{info, instrument};

/// Filter → SAP → normalized table, one query at a time.
pub struct ReportPipeline {
    client: SapClient,
    options: NormalizeOptions,
}

impl ReportPipeline {
    pub fn new(client: SapClient, options: NormalizeOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    #[instrument(skip(self))]
    pub fn run(&self, query: &Query) -> Result<QueryOutcome> {
        let raw = self.client.send(query)?;
        let outcome = interpret_response(raw.status, raw.body, &self.options)?;
        if let QueryOutcome::Table(t) = &outcome {
            info!(rows = t.len(), columns = t.columns().len(), "query complete");
        }
        Ok(outcome)
    }
}

/// Everything after the transport: status check, then normalization.
pub fn interpret_response(
    status: StatusCode,
    body: String,
    options: &NormalizeOptions,
) -> Result<QueryOutcome> {
    let body = into_body(RawResponse { status, body })?;
    normalize(&body, options)
}
