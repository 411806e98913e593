// src/normalize/mod.rs

pub mod date_parser;
pub mod table;

pub use table::{cell_text, Table};

use crate::error::{ReportError, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Service-internal column token, compared against uppercased names.
pub const METADATA_TOKEN: &str = "__METADATA";
/// Prefix the service uses for internal fields.
pub const INTERNAL_PREFIX: &str = "__";

/// Result of a query that reached the service and returned 200.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Table(Table),
    /// `d.results` was empty.
    NoData,
}

impl QueryOutcome {
    pub fn into_table(self) -> Option<Table> {
        match self {
            QueryOutcome::Table(t) => Some(t),
            QueryOutcome::NoData => None,
        }
    }
}

/// Optional post-processing steps applied after the table is built.
#[derive(Clone, Debug, Default)]
pub struct NormalizeOptions {
    /// Uppercase column name → display label.
    pub rename_columns: Option<HashMap<String, String>>,
    /// Rewrite `/Date(<millis>)/` values as `DD/MM/YYYY`.
    pub format_sap_dates: bool,
}

impl NormalizeOptions {
    pub fn with_renames(mut self, renames: HashMap<String, String>) -> Self {
        self.rename_columns = Some(renames);
        self
    }

    pub fn with_date_formatting(mut self) -> Self {
        self.format_sap_dates = true;
        self
    }
}

/// Labels for the business fields the supplier report knows about.
pub fn default_renames() -> HashMap<String, String> {
    [
        ("FARM_CODE", "NUMERO DA FAZENDA"),
        ("CONTRACT_NUMBER", "NUMERO DO CONTRATO"),
        ("LIFNR", "FORNECEDOR"),
        ("NAME1", "NOME DO FORNECEDOR"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn is_metadata_column(name: &str) -> bool {
    name.to_uppercase().contains(METADATA_TOKEN) || name.starts_with(INTERNAL_PREFIX)
}

/// Parse a raw response body and turn it into a report table.
pub fn normalize(body: &str, options: &NormalizeOptions) -> Result<QueryOutcome> {
    let payload: Value = serde_json::from_str(body)?;
    normalize_value(&payload, options)
}

/// Same as [`normalize`], for an already-parsed payload.
pub fn normalize_value(payload: &Value, options: &NormalizeOptions) -> Result<QueryOutcome> {
    let results = extract_results(payload)?;
    if results.is_empty() {
        warn!("SAP returned no records");
        return Ok(QueryOutcome::NoData);
    }

    let records = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.as_object()
                .ok_or_else(|| ReportError::Payload(format!("result {} is not an object", i)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table = build_table(&records);
    let before = table.columns().len();
    table.retain_columns(|c| !is_metadata_column(c));
    debug!(
        dropped = before - table.columns().len(),
        kept = table.columns().len(),
        "stripped metadata columns"
    );

    if let Some(renames) = &options.rename_columns {
        rename_columns(&mut table, renames);
    }
    if options.format_sap_dates {
        format_dates(&mut table);
    }

    info!("{} records found", table.len());
    Ok(QueryOutcome::Table(table))
}

fn extract_results(payload: &Value) -> Result<&Vec<Value>> {
    let d = payload
        .get("d")
        .ok_or_else(|| ReportError::Payload("missing `d` object".into()))?;
    d.get("results")
        .ok_or_else(|| ReportError::Payload("missing `d.results`".into()))?
        .as_array()
        .ok_or_else(|| ReportError::Payload("`d.results` is not an array".into()))
}

/// Columns are the union of record keys, uppercased, in first-seen order.
fn build_table(records: &[&Map<String, Value>]) -> Table {
    let mut columns: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(records.len());

    for record in records {
        let mut row = vec![Value::Null; columns.len()];
        for (key, value) in record.iter() {
            let name = key.to_uppercase();
            let idx = *index.entry(name.clone()).or_insert_with(|| {
                columns.push(name);
                columns.len() - 1
            });
            if idx >= row.len() {
                row.resize(idx + 1, Value::Null);
            }
            row[idx] = value.clone();
        }
        rows.push(row);
    }

    for row in &mut rows {
        row.resize(columns.len(), Value::Null);
    }
    Table::new(columns, rows)
}

/// A rename whose target is already a column name is skipped, so headers stay unique.
fn rename_columns(table: &mut Table, renames: &HashMap<String, String>) {
    let mut taken: HashSet<String> = table.columns().iter().cloned().collect();
    for column in table.columns_mut() {
        let Some(label) = renames.get(column.as_str()) else {
            continue;
        };
        if label.as_str() == column.as_str() {
            continue;
        }
        if taken.contains(label) {
            warn!(from = %column, to = %label, "rename target already exists, keeping original name");
            continue;
        }
        debug!(from = %column, to = %label, "renaming column");
        taken.remove(column.as_str());
        taken.insert(label.clone());
        *column = label.clone();
    }
}

fn format_dates(table: &mut Table) {
    let mut converted = 0usize;
    for cell in table.cells_mut() {
        if let Value::String(s) = cell {
            if let Some(formatted) = date_parser::format_sap_date(s) {
                *s = formatted;
                converted += 1;
            }
        }
    }
    debug!(converted, "formatted SAP dates");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    fn table(outcome: QueryOutcome) -> Table {
        outcome.into_table().expect("expected a table")
    }

    #[test]
    fn test_empty_results_is_no_data() -> Result<()> {
        let out = normalize(r#"{"d":{"results":[]}}"#, &NormalizeOptions::default())?;
        assert_eq!(out, QueryOutcome::NoData);
        Ok(())
    }

    #[test]
    fn test_missing_results_is_payload_error() {
        for body in [r#"{}"#, r#"{"d":{}}"#, r#"{"d":{"results":{}}}"#, r#"[]"#] {
            let err = normalize(body, &NormalizeOptions::default()).unwrap_err();
            assert!(matches!(err, ReportError::Payload(_)), "{body}: {err}");
            assert!(err.is_processing());
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = normalize("<html>login</html>", &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ReportError::Json(_)));
        assert!(err.is_processing());
    }

    #[test]
    fn test_non_object_record() {
        let err = normalize(r#"{"d":{"results":[1]}}"#, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, ReportError::Payload(_)));
    }

    #[test]
    fn test_uppercases_and_strips_metadata() -> Result<()> {
        let body = json!({"d": {"results": [{
            "__metadata": {"uri": "https://sap/Entity('1')", "type": "ZSUPPLIER"},
            "Lifnr": "100",
            "name1": "Fazenda Boa Vista",
            "__deferred": "x",
            "Item__Metadata": 1
        }]}});
        let t = table(normalize_value(&body, &NormalizeOptions::default())?);
        assert_eq!(t.columns(), &["LIFNR".to_string(), "NAME1".to_string()]);
        assert_eq!(t.get(0, "NAME1"), Some(&json!("Fazenda Boa Vista")));
        Ok(())
    }

    #[test]
    fn test_column_union_preserves_order() -> Result<()> {
        let body = json!({"d": {"results": [
            {"b": 1, "a": 2},
            {"c": 3, "b": 4}
        ]}});
        let t = table(normalize_value(&body, &NormalizeOptions::default())?);
        assert_eq!(t.columns(), &["B".to_string(), "A".to_string(), "C".to_string()]);
        assert_eq!(t.rows()[0], vec![json!(1), json!(2), Value::Null]);
        assert_eq!(t.rows()[1], vec![json!(4), Value::Null, json!(3)]);
        Ok(())
    }

    #[test]
    fn test_case_collision_collapses() -> Result<()> {
        let body = json!({"d": {"results": [{"qtd": 1, "QTD": 2}]}});
        let t = table(normalize_value(&body, &NormalizeOptions::default())?);
        assert_eq!(t.columns(), &["QTD".to_string()]);
        assert_eq!(t.get(0, "QTD"), Some(&json!(2)));
        Ok(())
    }

    #[test]
    fn test_rename_only_listed_columns() -> Result<()> {
        let body = json!({"d": {"results": [{"farm_code": "F1", "qtd": 5, "lifnr": "9"}]}});
        let opts = NormalizeOptions::default().with_renames(default_renames());
        let t = table(normalize_value(&body, &opts)?);
        assert_eq!(
            t.columns(),
            &[
                "NUMERO DA FAZENDA".to_string(),
                "QTD".to_string(),
                "FORNECEDOR".to_string()
            ]
        );
        assert_eq!(t.get(0, "NUMERO DA FAZENDA"), Some(&json!("F1")));
        Ok(())
    }

    #[test]
    fn test_rename_skips_taken_target() -> Result<()> {
        let body = json!({"d": {"results": [{"lifnr": "9", "fornecedor": "Usina X", "name1": "Y"}]}});
        let opts = NormalizeOptions::default().with_renames(default_renames());
        let t = table(normalize_value(&body, &opts)?);
        assert_eq!(
            t.columns(),
            &[
                "LIFNR".to_string(),
                "FORNECEDOR".to_string(),
                "NOME DO FORNECEDOR".to_string()
            ]
        );
        assert_eq!(t.get(0, "FORNECEDOR"), Some(&json!("Usina X")));
        assert_eq!(t.get(0, "LIFNR"), Some(&json!("9")));
        Ok(())
    }

    #[test]
    fn test_date_formatting_is_opt_in() -> Result<()> {
        let body = json!({"d": {"results": [{
            "erdat": "/Date(1700000000000)/",
            "obs": "entregue /Date(1)/",
            "qtd": 7
        }]}});

        let raw = table(normalize_value(&body, &NormalizeOptions::default())?);
        assert_eq!(raw.get(0, "ERDAT"), Some(&json!("/Date(1700000000000)/")));

        let opts = NormalizeOptions::default().with_date_formatting();
        let t = table(normalize_value(&body, &opts)?);
        assert_eq!(t.get(0, "ERDAT"), Some(&json!("14/11/2023")));
        assert_eq!(t.get(0, "OBS"), Some(&json!("entregue /Date(1)/")));
        assert_eq!(t.get(0, "QTD"), Some(&json!(7)));
        Ok(())
    }
}
