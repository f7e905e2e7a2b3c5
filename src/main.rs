use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use revops_reports::{
    config::{Config, HorizonQuery},
    error::QueryError,
    payload::{DailyDetailData, DailyReportData, HorizonRiskDocument, RiskReportDocument, TofDocument},
    query::{CommandRunner, QueryExecutor, QueryParams, QueryTemplate},
    reports::{
        formatters::{format_percent, NullDisplay},
        horizon_report, HorizonReportOptions, ReportFormat, ReportGenerator, ReportVersion, RiskReportBuilder,
        SlackBundle, TofReport,
    },
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "revops-report")]
#[command(about = "Revenue risk, pacing and funnel reports from warehouse-computed payloads")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the consolidated risk report
    Risk {
        /// Output format (html, text, json)
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Query file (defaults to queries.risk)
        #[arg(short, long)]
        query: Option<PathBuf>,

        /// Report version preset (2.5, 2.6, 2.7)
        #[arg(long = "report-version")]
        report_version: Option<String>,

        /// Output directory (defaults to reports.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Generate the multi-horizon risk report per product
    Horizons {
        /// Only this product (defaults to every configured horizon query)
        #[arg(short, long)]
        product: Option<String>,

        /// Query file; requires --product
        #[arg(short, long, requires = "product")]
        query: Option<PathBuf>,

        /// Output directory (defaults to reports.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Build the daily Slack message bundle
    Daily {
        /// Report query file (defaults to queries.daily_report)
        #[arg(long)]
        report_query: Option<PathBuf>,

        /// Detail query file (defaults to queries.daily_detail)
        #[arg(long)]
        detail_query: Option<PathBuf>,

        /// Bundle file path (defaults to <output_dir>/daily_slack_<date>.json)
        #[arg(short = 'f', long)]
        output_file: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Generate the top-of-funnel pacing report
    Funnel {
        /// Output format (json, table, all)
        #[arg(short, long, default_value = "all")]
        format: String,

        /// Query file (defaults to queries.funnel)
        #[arg(short, long)]
        query: Option<PathBuf>,

        /// Output directory (defaults to reports.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Initialize configuration file
    Init {
        /// Configuration file path
        #[arg(short = 'f', long, default_value = "revops-report.yml")]
        config_file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Values substituted into `{{name}}` query placeholders
#[derive(Args, Debug, Clone)]
struct ParamArgs {
    /// As-of date (defaults to today)
    #[arg(long)]
    as_of_date: Option<NaiveDate>,

    #[arg(long)]
    start_date: Option<NaiveDate>,

    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Extra query parameter as name=value; repeatable
    #[arg(long = "param", value_parser = QueryParams::parse_pair)]
    params: Vec<(String, String)>,
}

impl ParamArgs {
    fn to_params(&self, today: NaiveDate) -> QueryParams {
        let mut params = QueryParams::new().with("as_of_date", self.as_of_date.unwrap_or(today).to_string());
        if let Some(start) = self.start_date {
            params.insert("start_date", start.to_string());
        }
        if let Some(end) = self.end_date {
            params.insert("end_date", end.to_string());
        }
        for (name, value) in &self.params {
            params.insert(name.clone(), value.clone());
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunnelFormat {
    Json,
    Table,
    All,
}

impl FunnelFormat {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(FunnelFormat::Json),
            "table" => Ok(FunnelFormat::Table),
            "all" => Ok(FunnelFormat::All),
            _ => Err(anyhow::anyhow!("Unsupported format: {} (expected json, table or all)", s)),
        }
    }

    fn json(self) -> bool {
        matches!(self, FunnelFormat::Json | FunnelFormat::All)
    }

    fn table(self) -> bool {
        matches!(self, FunnelFormat::Table | FunnelFormat::All)
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        if let Some(raw) = err.downcast_ref::<QueryError>().and_then(QueryError::raw_output) {
            debug!("Raw query output:\n{}", raw);
        }
        eprintln!("Error: {}", describe_error(&err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize tracing
    init_tracing(&cli.log_level)?;

    info!("Starting revops report generator");

    if let Commands::Init { config_file, force } = &cli.command {
        return init_config(config_file, *force).await;
    }

    // Load configuration
    let config = load_config(cli.config.as_ref()).await?;
    let now = Local::now().naive_local();

    match cli.command {
        Commands::Risk {
            format,
            query,
            report_version,
            output_dir,
            params,
        } => {
            let format: ReportFormat = format.parse()?;
            let version = report_version.map(|v| v.parse::<ReportVersion>()).transpose()?;
            let query = query.unwrap_or_else(|| config.queries.risk.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.reports.output_dir.clone());
            generate_risk(&config, &query, &params, format, version, &output_dir, now).await?;
        }

        Commands::Horizons {
            product,
            query,
            output_dir,
            params,
        } => {
            let targets = horizon_targets(&config, product, query)?;
            let output_dir = output_dir.unwrap_or_else(|| config.reports.output_dir.clone());
            generate_horizons(&config, &targets, &params, &output_dir, now).await?;
        }

        Commands::Daily {
            report_query,
            detail_query,
            output_file,
            params,
        } => {
            let report_query = report_query.unwrap_or_else(|| config.queries.daily_report.clone());
            let detail_query = detail_query.unwrap_or_else(|| config.queries.daily_detail.clone());
            generate_daily(&config, &report_query, &detail_query, &params, output_file, now).await?;
        }

        Commands::Funnel {
            format,
            query,
            output_dir,
            params,
        } => {
            let format = FunnelFormat::parse(&format)?;
            let query = query.unwrap_or_else(|| config.queries.funnel.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.reports.output_dir.clone());
            generate_funnel(&config, &query, &params, format, &output_dir, now).await?;
        }

        Commands::Init { .. } => {}
    }

    Ok(())
}

/// One line for standard error; timeouts name the budget
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<QueryError>() {
        Some(QueryError::Timeout { seconds }) => format!(
            "query timed out after {} seconds (raise query.timeout_seconds or REVOPS_QUERY_TIMEOUT_SECONDS)",
            seconds
        ),
        _ => format!("{:#}", err),
    }
}

/// Initialize tracing with the specified log level
fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to create env filter")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}

/// Load configuration from file or use defaults, then apply environment overrides
async fn load_config(config_path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {:?}", path);
            Config::load_from_file(path).await?
        }
        Some(path) => {
            warn!("Configuration file not found: {:?}. Using defaults.", path);
            Config::default()
        }
        None => Config::default(),
    };

    config.apply_env()?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn executor(config: &Config) -> QueryExecutor<CommandRunner> {
    let runner = CommandRunner::new(
        config.query.command.clone(),
        config.query.args.clone(),
        config.query.timeout(),
    );
    QueryExecutor::new(runner, config.query.payload_column.clone())
}

/// Read a query file and substitute its placeholders
async fn render_query(path: &Path, params: &QueryParams) -> Result<String> {
    let template = QueryTemplate::from_file(path).await?;
    debug!("Placeholders in {:?}: {:?}", path, template.placeholders());
    let sql = template
        .render(params)
        .with_context(|| format!("Failed to render query: {:?}", path))?;
    Ok(sql)
}

/// Write one output file, creating the directory first
async fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write output to: {:?}", path))?;
    info!("Report written to: {:?}", path);
    Ok(())
}

/// `YYYY-MM-DD` of the report's as-of date, or of today when it is not a date
fn file_date(as_of: &str, now: NaiveDateTime) -> String {
    as_of
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or_else(|| now.date())
        .format("%Y-%m-%d")
        .to_string()
}

/// Generate the consolidated risk report
async fn generate_risk(
    config: &Config,
    query: &Path,
    params: &ParamArgs,
    format: ReportFormat,
    version: Option<ReportVersion>,
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<()> {
    let sql = render_query(query, &params.to_params(now.date())).await?;
    let fetched = executor(config).fetch::<RiskReportDocument>(sql).await?;
    let doc = &fetched.document;

    let options = config.risk_options(version, now);
    info!("Building risk report (version {})", options.version);
    let document = RiskReportBuilder::new(doc, &options).build();
    let content = ReportGenerator::new().generate(&document, &fetched.payload, format)?;

    let as_of = doc.report_date.as_deref().unwrap_or_else(|| doc.period.as_of());
    let path = output_dir.join(format!(
        "{}_{}.{}",
        config.reports.file_prefix,
        file_date(as_of, now),
        format.extension()
    ));
    write_output(&path, &content).await?;

    println!("Risk report generated");
    println!("  Report date:    {}", as_of);
    println!(
        "  QTD attainment: {}",
        format_percent(doc.grand_total.attainment(), 1, NullDisplay::Zero)
    );
    println!("  Output:         {}", path.display());

    Ok(())
}

/// Resolve which horizon queries to run
fn horizon_targets(config: &Config, product: Option<String>, query: Option<PathBuf>) -> Result<Vec<HorizonQuery>> {
    let Some(product) = product else {
        if config.queries.horizons.is_empty() {
            return Err(anyhow::anyhow!("No horizon queries configured"));
        }
        return Ok(config.queries.horizons.clone());
    };

    let configured = config
        .queries
        .horizons
        .iter()
        .find(|h| h.product.eq_ignore_ascii_case(&product));

    match (configured, query) {
        (Some(entry), Some(query)) => Ok(vec![HorizonQuery {
            query,
            ..entry.clone()
        }]),
        (Some(entry), None) => Ok(vec![entry.clone()]),
        (None, Some(query)) => Ok(vec![HorizonQuery {
            product,
            query,
            validate_targets: false,
        }]),
        (None, None) => Err(anyhow::anyhow!(
            "No horizon query configured for product {}; pass --query",
            product
        )),
    }
}

/// Generate one multi-horizon text report per product, sequentially
async fn generate_horizons(
    config: &Config,
    targets: &[HorizonQuery],
    params: &ParamArgs,
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<()> {
    let params = params.to_params(now.date());
    let executor = executor(config);

    println!("Horizon risk reports generated");
    for target in targets {
        info!("Generating {} horizon report", target.product);
        let sql = render_query(&target.query, &params).await?;
        let fetched = executor.fetch::<HorizonRiskDocument>(sql).await?;

        let options = HorizonReportOptions {
            product: target.product.clone(),
            regions: config.reports.regions.clone(),
            validate_targets: target.validate_targets,
        };
        let content = horizon_report(&fetched.document, &options);
        let path = output_dir.join(format!("report_{}_risks.txt", target.product.to_lowercase()));
        write_output(&path, &content).await?;

        let risks: usize = config
            .reports
            .regions
            .iter()
            .map(|region| fetched.document.risks(region).len())
            .sum();
        println!("  {}: {} risks -> {}", target.product, risks, path.display());
    }

    Ok(())
}

/// Run both daily queries and write the message bundle
async fn generate_daily(
    config: &Config,
    report_query: &Path,
    detail_query: &Path,
    params: &ParamArgs,
    output_file: Option<PathBuf>,
    now: NaiveDateTime,
) -> Result<()> {
    let params = params.to_params(now.date());
    let report_sql = render_query(report_query, &params).await?;
    let detail_sql = render_query(detail_query, &params).await?;

    let executor = executor(config);
    let report = executor.fetch::<DailyReportData>(report_sql).await?;
    let detail = executor.fetch::<DailyDetailData>(detail_sql).await?;

    let bundle = SlackBundle::build(&report, &detail, config.slack.main_message_limit)?;
    let content = serde_json::to_string_pretty(&bundle)?;

    let as_of = report.document.as_of_date.as_deref().unwrap_or("");
    let path = output_file.unwrap_or_else(|| {
        config
            .reports
            .output_dir
            .join(format!("daily_slack_{}.json", file_date(as_of, now)))
    });
    write_output(&path, &content).await?;

    println!("Daily message bundle generated");
    println!("  Run id:         {}", bundle.run_id);
    println!("  Main message:   {} chars", bundle.main_message.chars().count());
    println!("  Thread message: {} chars", bundle.thread_message.chars().count());
    println!("  Output:         {}", path.display());

    Ok(())
}

/// Generate the top-of-funnel report files
async fn generate_funnel(
    config: &Config,
    query: &Path,
    params: &ParamArgs,
    format: FunnelFormat,
    output_dir: &Path,
    now: NaiveDateTime,
) -> Result<()> {
    let sql = render_query(query, &params.to_params(now.date())).await?;
    let fetched = executor(config).fetch::<TofDocument>(sql).await?;
    let stamp = now.format("%Y-%m-%d_%H%M%S").to_string();

    let mut written = Vec::new();
    if format.json() {
        let path = output_dir.join(format!("tof_report_{}.json", stamp));
        write_output(&path, &serde_json::to_string_pretty(&fetched.payload)?).await?;
        written.push(path);
    }

    if format.table() {
        let report = TofReport::new(&fetched.document, &config.reports.products);
        let summary = report.summary();

        let path = output_dir.join(format!("tof_summary_{}.txt", stamp));
        write_output(&path, &summary).await?;
        written.push(path);

        let path = output_dir.join(format!("tof_detail_{}.txt", stamp));
        write_output(&path, &report.detail()).await?;
        written.push(path);

        println!("{}", summary);
    }

    println!("Top-of-funnel report generated");
    for path in written {
        println!("  Output: {}", path.display());
    }

    Ok(())
}

/// Initialize configuration file
async fn init_config(config_file: &Path, force: bool) -> Result<()> {
    info!("Initializing configuration file: {:?}", config_file);

    if config_file.exists() && !force {
        return Err(anyhow::anyhow!(
            "Configuration file already exists: {:?} (use --force to overwrite)",
            config_file
        ));
    }

    Config::default()
        .save_to_file(config_file)
        .await
        .with_context(|| format!("Failed to write configuration file: {:?}", config_file))?;

    info!("Configuration file created successfully: {:?}", config_file);
    println!("Configuration file created: {:?}", config_file);
    println!("Edit this file to point at your query files and warehouse CLI.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_file_date_prefers_report_date() {
        let now = at("2026-03-01");
        assert_eq!(file_date("2026-02-10", now), "2026-02-10");
        assert_eq!(file_date("2026-02-10T06:00:00", now), "2026-02-10");
        assert_eq!(file_date("N/A", now), "2026-03-01");
    }

    #[test]
    fn test_params_default_as_of_to_today() {
        let args = ParamArgs {
            as_of_date: None,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            end_date: None,
            params: vec![("region".to_string(), "EMEA".to_string())],
        };
        let params = args.to_params(at("2026-02-10").date());
        assert_eq!(params.get("as_of_date"), Some("2026-02-10"));
        assert_eq!(params.get("start_date"), Some("2026-01-01"));
        assert_eq!(params.get("end_date"), None);
        assert_eq!(params.get("region"), Some("EMEA"));
    }

    #[test]
    fn test_horizon_targets() {
        let config = Config::default();
        assert_eq!(horizon_targets(&config, None, None).unwrap().len(), 2);

        let r360 = horizon_targets(&config, Some("r360".to_string()), None).unwrap();
        assert_eq!(r360[0].product, "R360");
        assert!(r360[0].validate_targets);

        let custom = horizon_targets(&config, Some("POR".to_string()), Some(PathBuf::from("q.sql"))).unwrap();
        assert_eq!(custom[0].query, PathBuf::from("q.sql"));
        assert!(!custom[0].validate_targets);

        assert!(horizon_targets(&config, Some("ACME".to_string()), None).is_err());
    }

    #[test]
    fn test_timeout_error_names_budget() {
        let err = anyhow::Error::new(QueryError::Timeout { seconds: 300 });
        assert!(describe_error(&err).starts_with("query timed out after 300 seconds"));

        let err = anyhow::anyhow!("boom").context("Failed to write output");
        assert_eq!(describe_error(&err), "Failed to write output: boom");
    }

    #[test]
    fn test_funnel_format() {
        assert!(FunnelFormat::parse("ALL").unwrap().json());
        assert!(!FunnelFormat::parse("table").unwrap().json());
        assert!(FunnelFormat::parse("html").is_err());
    }
}
