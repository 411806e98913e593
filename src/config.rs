// src/config.rs

use crate::error::{ReportError, Result};
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fmt, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};
use url::Url;

pub const SECRETS_PATH_ENV: &str = "SUPPLIER_REPORT_SECRETS";
pub const DEFAULT_SECRETS_PATH: &str = "secrets.yaml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// On-disk layout of the secrets file. Section and key names follow the
/// secret store the report was first deployed with.
#[derive(Debug, Default, Deserialize)]
pub struct SecretsFile {
    #[serde(default)]
    pub odatas: ODataSection,
    #[serde(default)]
    pub sap_logon: LogonSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct ODataSection {
    #[serde(rename = "ODATA_URL")]
    pub odata_url: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct LogonSection {
    #[serde(rename = "SAP_USER")]
    pub sap_user: Option<String>,
    #[serde(rename = "SAP_PASS")]
    pub sap_pass: Option<String>,
}

impl fmt::Debug for LogonSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogonSection")
            .field("sap_user", &self.sap_user)
            .field("sap_pass", &self.sap_pass.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportSection {
    pub season_label: Option<String>,
    pub timeout_secs: Option<u64>,
    pub rename_columns: Option<HashMap<String, String>>,
    /// Send the key filter as an OData `$filter` query parameter.
    pub odata_filter: Option<bool>,
}

/// Resolved runtime settings.
#[derive(Clone)]
pub struct Settings {
    pub endpoint: Url,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
    pub season_label: Option<String>,
    pub rename_columns: Option<HashMap<String, String>>,
    pub odata_filter: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint.as_str())
            .field("user", &self.user)
            .field("password", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .field("season_label", &self.season_label)
            .field("rename_columns", &self.rename_columns)
            .field("odata_filter", &self.odata_filter)
            .finish()
    }
}

impl Settings {
    /// Load from `path` (or `$SUPPLIER_REPORT_SECRETS`, or `secrets.yaml`),
    /// then let `ODATA_URL`, `SAP_USER` and `SAP_PASS` from the environment win.
    ///
    /// An explicitly named file must exist; the default one may be absent as
    /// long as the environment supplies everything.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match env::var(SECRETS_PATH_ENV) {
                Ok(p) if !p.trim().is_empty() => (PathBuf::from(p.trim()), true),
                _ => (PathBuf::from(DEFAULT_SECRETS_PATH), false),
            },
        };

        let file = if path.exists() || explicit {
            info!("loading secrets from {}", path.display());
            read_secrets(&path)?
        } else {
            debug!("no secrets file at {}, using environment only", path.display());
            SecretsFile::default()
        };

        let env: HashMap<String, String> = env::vars().collect();
        Self::from_sources(file, &env)
    }

    pub fn from_sources(file: SecretsFile, env: &HashMap<String, String>) -> Result<Self> {
        let pick = |key: &str, from_file: Option<String>| -> Result<String> {
            env.get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .or(from_file)
                .ok_or_else(|| ReportError::Config(format!("{} is not set", key)))
        };

        let raw_url = pick("ODATA_URL", file.odatas.odata_url)?;
        let endpoint = Url::parse(raw_url.trim())
            .map_err(|e| ReportError::Config(format!("ODATA_URL {:?}: {}", raw_url, e)))?;
        let user = pick("SAP_USER", file.sap_logon.sap_user)?;
        let password = pick("SAP_PASS", file.sap_logon.sap_pass)?;

        Ok(Self {
            endpoint,
            user,
            password,
            timeout_secs: file.report.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            season_label: file.report.season_label,
            rename_columns: file.report.rename_columns.map(|m| {
                m.into_iter()
                    .map(|(k, v)| (k.to_uppercase(), v))
                    .collect()
            }),
            odata_filter: file.report.odata_filter.unwrap_or(false),
        })
    }
}

pub fn read_secrets(path: &Path) -> Result<SecretsFile> {
    let text = fs::read_to_string(path)
        .map_err(|e| ReportError::Config(format!("reading {}: {}", path.display(), e)))?;
    parse_secrets(&text)
        .map_err(|e| ReportError::Config(format!("parsing {}: {}", path.display(), e)))
}

pub fn parse_secrets(text: &str) -> std::result::Result<SecretsFile, serde_yaml::Error> {
    serde_yaml::from_str(text)
}
