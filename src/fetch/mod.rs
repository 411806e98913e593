// src/fetch/mod.rs

use crate::config::Settings;
use crate::error::{ReportError, Result};
use crate::filter::Query;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const PERIOD_LABEL_HEADER: &str = "periodo";
pub const PERIOD_START_HEADER: &str = "data_ini";
pub const PERIOD_END_HEADER: &str = "data_fim";

/// Raw answer from the service: status plus body text, before any parsing.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Blocking client for the SAP OData endpoint.
pub struct SapClient {
    client: Client,
    endpoint: Url,
    user: String,
    password: String,
    odata_filter: bool,
}

impl SapClient {
    pub fn new(endpoint: Url, user: String, password: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CSRF_HEADER, HeaderValue::from_static("fetch"));

        // the SAP gateway serves a self-signed certificate
        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            user,
            password,
            odata_filter: false,
        })
    }

    /// Send the key filter as an OData `$filter` parameter. Off by default:
    /// the stock endpoint takes no query string.
    pub fn with_odata_filter(mut self, on: bool) -> Self {
        self.odata_filter = on;
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            settings.endpoint.clone(),
            settings.user.clone(),
            settings.password.clone(),
            Duration::from_secs(settings.timeout_secs),
        )?
        .with_odata_filter(settings.odata_filter))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Assemble the GET for `query` without sending it.
    pub fn request(&self, query: &Query) -> Result<RequestBuilder> {
        let mut req = self
            .client
            .get(self.endpoint.clone())
            .basic_auth(&self.user, Some(&self.password));

        match &query.filter {
            Some(filter) if self.odata_filter => {
                req = req.query(&[("$filter", filter.odata_expression())]);
            }
            Some(filter) => debug!(key = %filter.key, "key filter not sent, odata_filter is off"),
            None => {}
        }

        if let Some(period) = &query.period {
            let label = HeaderValue::from_str(&period.season_label).map_err(|e| {
                ReportError::Config(format!(
                    "season label {:?} is not a valid header value: {}",
                    period.season_label, e
                ))
            })?;
            req = req
                .header(PERIOD_LABEL_HEADER, label)
                .header(PERIOD_START_HEADER, period.start_compact())
                .header(PERIOD_END_HEADER, period.end_compact());
        }

        Ok(req)
    }

    /// Send the query and return whatever came back, any status.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub fn send(&self, query: &Query) -> Result<RawResponse> {
        info!("querying SAP");
        let resp = self.request(query)?.send()?;
        let status = resp.status();
        let body = resp.text()?;
        debug!(%status, bytes = body.len(), "SAP responded");
        Ok(RawResponse { status, body })
    }
}

/// Only 200 counts as success; the raw body is kept for the error report.
pub fn into_body(raw: RawResponse) -> Result<String> {
    if raw.status == StatusCode::OK {
        Ok(raw.body)
    } else {
        Err(ReportError::Remote {
            status: raw.status,
            body: raw.body,
        })
    }
}
