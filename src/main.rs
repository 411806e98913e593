use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{path::PathBuf, process::ExitCode};
use supplier_report::{
    export::write_xlsx,
    normalize::default_renames,
    FilterKey, KeyFilter, NormalizeOptions, Period, Query, QueryOutcome, ReportError,
    ReportPipeline, SapClient, Settings, EXPORT_FILE_NAME,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FilterArg {
    FarmCode,
    ContractNumber,
}

impl From<FilterArg> for FilterKey {
    fn from(f: FilterArg) -> Self {
        match f {
            FilterArg::FarmCode => FilterKey::FarmCode,
            FilterArg::ContractNumber => FilterKey::ContractNumber,
        }
    }
}

/// Relatório de Fornecedores: query SAP for supplier records and export them to Excel.
#[derive(Parser, Debug)]
#[command(name = "supplier-report", version)]
struct Args {
    /// Secrets file (YAML). Defaults to $SUPPLIER_REPORT_SECRETS or ./secrets.yaml
    #[arg(long)]
    secrets: Option<PathBuf>,

    /// Key to filter on
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,

    /// Filter value, sent as typed
    #[arg(long, default_value = "", requires = "filter")]
    value: String,

    /// Year of the reporting month
    #[arg(long, requires = "month")]
    year: Option<i32>,

    /// Reporting month (1-12)
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// Season label sent with the period; overrides the secrets file
    #[arg(long)]
    season: Option<String>,

    /// Relabel known business columns
    #[arg(long)]
    rename: bool,

    /// Rewrite SAP /Date(...)/ values as DD/MM/YYYY
    #[arg(long)]
    format_dates: bool,

    /// Write an .xlsx export (default file name when no path is given)
    #[arg(long, num_args = 0..=1, default_missing_value = EXPORT_FILE_NAME)]
    export: Option<PathBuf>,
}

fn main() -> ExitCode {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&e),
    }
}

fn run(args: &Args) -> Result<()> {
    let settings = Settings::load(args.secrets.as_deref()).context("loading configuration")?;
    info!(endpoint = %settings.endpoint, "startup");

    let query = build_query(args, &settings)?;
    let options = build_options(args, &settings);

    let client = SapClient::from_settings(&settings)?;
    let pipeline = ReportPipeline::new(client, options);

    let table = match pipeline.run(&query)? {
        QueryOutcome::NoData => {
            warn!("no records returned");
            println!("Nenhum registro retornado pelo SAP.");
            return Ok(());
        }
        QueryOutcome::Table(t) => t,
    };

    println!("{} registros encontrados.", table.len());
    println!();
    print!("{}", table);

    if let Some(dest) = &args.export {
        write_xlsx(&table, dest)?;
        println!();
        println!("Exportado para {}", dest.display());
    }
    Ok(())
}

fn build_query(args: &Args, settings: &Settings) -> Result<Query> {
    let mut query = Query::default();

    if let Some(f) = args.filter {
        let filter = KeyFilter::new(f.into(), args.value.clone());
        info!(key = %filter.key, label = filter.key.label(), "filter selected");
        query = query.with_filter(filter);
    }

    if let (Some(year), Some(month)) = (args.year, args.month) {
        let label = args
            .season
            .clone()
            .or_else(|| settings.season_label.clone())
            .unwrap_or_else(|| year.to_string());
        let period = Period::for_month(year, month, label)?;
        info!(
            start = %period.start,
            end = %period.end,
            season = %period.season_label,
            "period selected"
        );
        query = query.with_period(period);
    }

    Ok(query)
}

fn build_options(args: &Args, settings: &Settings) -> NormalizeOptions {
    let mut options = NormalizeOptions::default();
    if args.rename {
        let mut renames = default_renames();
        if let Some(extra) = &settings.rename_columns {
            renames.extend(extra.clone());
        }
        options = options.with_renames(renames);
    }
    if args.format_dates {
        options = options.with_date_formatting();
    }
    options
}

const EXIT_OTHER: u8 = 1;
const EXIT_REMOTE: u8 = 2;
const EXIT_PROCESSING: u8 = 3;

/// Exit code and user-facing text for a failed run.
#[derive(Debug, PartialEq, Eq)]
struct Failure {
    code: u8,
    message: String,
}

fn classify_failure(e: &anyhow::Error) -> Failure {
    match e.downcast_ref::<ReportError>() {
        Some(ReportError::Remote { status, body }) => Failure {
            code: EXIT_REMOTE,
            message: format!("Erro {} ao consultar SAP\n{}", status.as_u16(), body),
        },
        Some(err) if err.is_remote() || err.is_processing() => Failure {
            code: if err.is_remote() {
                EXIT_REMOTE
            } else {
                EXIT_PROCESSING
            },
            message: format!("Erro ao conectar ou processar os dados.\n{:#}", e),
        },
        _ => Failure {
            code: EXIT_OTHER,
            message: format!("Error: {:#}", e),
        },
    }
}

fn report_failure(e: &anyhow::Error) -> ExitCode {
    error!("{:#}", e);
    let failure = classify_failure(e);
    if failure.code == EXIT_OTHER {
        eprintln!("{}", failure.message);
    } else {
        println!("{}", failure.message);
    }
    ExitCode::from(failure.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use reqwest::StatusCode;
    use rust_xlsxwriter::XlsxError;

    #[test]
    fn test_remote_status_and_body() {
        let e = anyhow::Error::from(ReportError::Remote {
            status: StatusCode::UNAUTHORIZED,
            body: "<error>login</error>".into(),
        });
        let f = classify_failure(&e);
        assert_eq!(f.code, EXIT_REMOTE);
        assert_eq!(f.message, "Erro 401 ao consultar SAP\n<error>login</error>");
    }

    #[test]
    fn test_transport_is_remote() {
        let err = reqwest::blocking::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let f = classify_failure(&anyhow::Error::from(ReportError::Transport(err)));
        assert_eq!(f.code, EXIT_REMOTE);
        assert!(f.message.starts_with("Erro ao conectar ou processar os dados."));
    }

    #[test]
    fn test_processing_errors() {
        for err in [
            ReportError::Payload("missing `d.results`".into()),
            ReportError::Export(XlsxError::RowColumnLimitError),
        ] {
            let detail = err.to_string();
            let f = classify_failure(&anyhow::Error::from(err));
            assert_eq!(f.code, EXIT_PROCESSING);
            assert!(f.message.contains(&detail), "{}", f.message);
        }
    }

    #[test]
    fn test_context_wrapped_error_still_classified() {
        let e = Err::<(), _>(ReportError::Payload("bad shape".into()))
            .context("normalizing response")
            .unwrap_err();
        let f = classify_failure(&e);
        assert_eq!(f.code, EXIT_PROCESSING);
        assert!(f.message.contains("normalizing response"));
        assert!(f.message.contains("bad shape"));
    }

    #[test]
    fn test_other_errors() {
        let f = classify_failure(&anyhow::Error::from(ReportError::Config(
            "SAP_USER is not set".into(),
        )));
        assert_eq!(f.code, EXIT_OTHER);
        assert!(f.message.contains("SAP_USER is not set"));

        let f = classify_failure(&anyhow!("something else"));
        assert_eq!(f.code, EXIT_OTHER);
    }
}
