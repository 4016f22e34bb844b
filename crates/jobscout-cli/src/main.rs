use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use jobscout_client::{PlainTextCleaner, ReqwestExchangeFactory, format_description};
use jobscout_core::config::{EnrichmentMode, LogLevel, ResolvedConfig};
use jobscout_core::enrichment::Enricher;
use jobscout_core::logging;
use jobscout_core::models::{DescriptionFormat, JobPost, Site};
use jobscout_core::traits::ExchangeFactory;
use jobscout_core::transport::{HttpRequestSpec, RequestKind, Transport};
use jobscout_core::EnrichmentConfig;

#[derive(Parser)]
#[command(name = "jobscout", version, about = "Job posting aggregation toolkit")]
struct Cli {
    /// JSON file with logging, transport and output settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// User-Agent sent with every request
    #[arg(long, global = true, env = "JOBSCOUT_USER_AGENT")]
    user_agent: Option<String>,

    /// Comma-separated proxies rotated round-robin ("localhost" = direct)
    #[arg(long, global = true, env = "JOBSCOUT_PROXIES", value_delimiter = ',')]
    proxies: Vec<String>,

    /// Log at debug level regardless of the config file
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the transport (limits, retries, adaptive concurrency)
    Fetch {
        /// Target URL
        #[arg(short, long)]
        url: String,

        /// Source the request is attributed to
        #[arg(short, long, value_parser = Site::from_str)]
        site: Option<Site>,

        /// Retry budget to use
        #[arg(short, long, value_enum, default_value_t = KindArg::Other)]
        kind: KindArg,
    },

    /// Enrich a single job posting and print it as JSON
    Enrich {
        /// Job detail page URL on the source site
        #[arg(short, long)]
        url: String,

        /// Source the job came from
        #[arg(short, long, value_parser = Site::from_str, default_value = "linkedin")]
        site: Site,

        /// Job title, used as extra context for the extractors
        #[arg(short, long, default_value = "")]
        title: String,

        /// External apply page on the employer's site
        #[arg(long)]
        apply_url: Option<String>,

        /// Company page URL as listed by the source
        #[arg(long)]
        company_url: Option<String>,

        /// Enrichment preset
        #[arg(short, long, value_enum, default_value_t = ModeArg::Medium)]
        mode: ModeArg,

        /// Attach sources used, budget spent and per-field confidence
        #[arg(long, default_value_t = false)]
        meta: bool,
    },

    /// Fetch a job description page and render it as markdown, html or plain text
    Describe {
        /// Job detail page URL
        #[arg(short, long)]
        url: String,

        /// Source the page belongs to
        #[arg(short, long, value_parser = Site::from_str)]
        site: Option<Site>,

        /// Output format (defaults to the config file's description format)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    List,
    Detail,
    Other,
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::List => RequestKind::List,
            KindArg::Detail => RequestKind::Detail,
            KindArg::Other => RequestKind::Other,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Low,
    Medium,
    High,
}

impl From<ModeArg> for EnrichmentMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Low => EnrichmentMode::Low,
            ModeArg::Medium => EnrichmentMode::Medium,
            ModeArg::High => EnrichmentMode::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Markdown,
    Html,
    Plain,
}

impl From<FormatArg> for DescriptionFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Markdown => DescriptionFormat::Markdown,
            FormatArg::Html => DescriptionFormat::Html,
            FormatArg::Plain => DescriptionFormat::Plain,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logging
    };
    logging::init(level)?;

    let transport = build_transport(&config)?;
    let outcome = match cli.command {
        Commands::Fetch { url, site, kind } => cmd_fetch(&transport, &url, site, kind).await,
        Commands::Enrich {
            url,
            site,
            title,
            apply_url,
            company_url,
            mode,
            meta,
        } => {
            let job = JobPost {
                job_url_direct: apply_url,
                company_url,
                ..JobPost::new(title, url)
            };
            let mut enrichment = EnrichmentConfig::for_mode(mode.into());
            enrichment.expose_meta = meta;
            let enricher = Enricher::new(site, enrichment, PlainTextCleaner::new())
                .with_user_agent(config.transport.user_agent.clone());
            cmd_enrich(&transport, &enricher, job).await
        }
        Commands::Describe { url, site, format } => {
            let format = format.map_or(config.output.description_format, Into::into);
            cmd_describe(&transport, &url, site, format).await
        }
    };

    transport.close().await;
    outcome
}

/// Reads the config file (if any) and applies flag/env overrides.
fn load_config(cli: &Cli) -> Result<ResolvedConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ResolvedConfig::default(),
    };

    if let Some(user_agent) = &cli.user_agent {
        config.transport.user_agent = Some(user_agent.clone());
    }
    if !cli.proxies.is_empty() {
        config.transport.proxies = cli.proxies.clone();
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<ResolvedConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    ResolvedConfig::from_json(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
}

fn build_transport(config: &ResolvedConfig) -> Result<Transport> {
    let exchange = ReqwestExchangeFactory::new()
        .create(&config.transport)
        .context("Failed to create HTTP client")?;
    Ok(Transport::new(&config.transport, exchange))
}

async fn cmd_fetch(
    transport: &Transport,
    url: &str,
    site: Option<Site>,
    kind: KindArg,
) -> Result<()> {
    let mut spec = HttpRequestSpec::get(url).kind(kind.into());
    if let Some(site) = site {
        spec = spec.source(site);
    }

    tracing::info!("Fetching {}", url);
    let result = transport.request(spec).await?;

    tracing::info!(
        status = result.status,
        bytes = result.text.len(),
        final_url = %result.url,
        "Fetch complete"
    );

    let output = serde_json::json!({
        "status": result.status,
        "ok": result.ok,
        "url": result.url,
        "contentType": result.content_type(),
        "text": result.text,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_enrich(
    transport: &Transport,
    enricher: &Enricher<PlainTextCleaner>,
    job: JobPost,
) -> Result<()> {
    tracing::info!(mode = ?enricher.config().mode, "Enriching {}", job.job_url);
    let enriched = enricher.enrich(job, None, transport).await;
    println!("{}", serde_json::to_string_pretty(&enriched)?);
    Ok(())
}

async fn cmd_describe(
    transport: &Transport,
    url: &str,
    site: Option<Site>,
    format: DescriptionFormat,
) -> Result<()> {
    let mut spec = HttpRequestSpec::get(url).kind(RequestKind::Detail);
    if let Some(site) = site {
        spec = spec.source(site);
    }

    let page = transport.request(spec).await?.error_for_status()?;
    let description = format_description(&page.text, format)
        .with_context(|| format!("Failed to render {url}"))?;
    println!("{description}");
    Ok(())
}
