use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paper_harvest::config::{find_config_file, load_config, Config};
use paper_harvest::models::{DownloadRequest, Paper, PaperRecord, ReadRequest, SearchQuery};
use paper_harvest::sources::{SourceCapabilities, SourceRegistry};
use paper_harvest::{Source, SourceType};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// paper-harvest - Search, download and read academic papers from multiple sources
#[derive(Parser, Debug)]
#[command(name = "paper-harvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search, download and read academic papers from multiple sources", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path (defaults to ./paper-harvest.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Plain text on a terminal, JSON otherwise
    Auto,
    /// JSON records
    Json,
    /// Plain text
    Plain,
}

/// Available research sources
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    #[value(name = "arxiv")]
    Arxiv,
    #[value(name = "pubmed")]
    Pubmed,
    #[value(name = "biorxiv")]
    Biorxiv,
    #[value(name = "medrxiv")]
    Medrxiv,
    #[value(name = "semantic")]
    Semantic,
    #[value(name = "iacr")]
    Iacr,
    #[value(name = "google_scholar")]
    GoogleScholar,
    #[value(name = "sci_hub")]
    SciHub,
    #[value(name = "all")]
    All,
}

impl SourceArg {
    fn source_type(self) -> Option<SourceType> {
        match self {
            SourceArg::Arxiv => Some(SourceType::Arxiv),
            SourceArg::Pubmed => Some(SourceType::PubMed),
            SourceArg::Biorxiv => Some(SourceType::BioRxiv),
            SourceArg::Medrxiv => Some(SourceType::MedRxiv),
            SourceArg::Semantic => Some(SourceType::SemanticScholar),
            SourceArg::Iacr => Some(SourceType::IACR),
            SourceArg::GoogleScholar => Some(SourceType::GoogleScholar),
            SourceArg::SciHub => Some(SourceType::SciHub),
            SourceArg::All => None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for papers
    #[command(alias = "s")]
    Search {
        /// Search query (a subject category for bioRxiv/medRxiv)
        query: String,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Maximum results per source
        #[arg(long, short, default_value_t = 10)]
        max_results: usize,

        /// Year filter ("2019", "2016-2020", "2010-", "-2015")
        #[arg(long)]
        year: Option<String>,

        /// Category filter
        #[arg(long)]
        category: Option<String>,

        /// Days to look back on date-windowed servers
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Skip per-paper detail pages where a source fetches them
        #[arg(long)]
        no_details: bool,
    },

    /// Download a paper's PDF
    #[command(alias = "d")]
    Download {
        /// Paper ID (arXiv id, DOI, IACR id, ...)
        paper_id: String,

        /// Source to download from
        #[arg(long, short, value_enum)]
        source: SourceArg,

        /// Directory to save into (defaults to the configured download path)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,
    },

    /// Download a paper and print its text
    #[command(alias = "r")]
    Read {
        /// Paper ID
        paper_id: String,

        /// Source to read from
        #[arg(long, short, value_enum)]
        source: SourceArg,

        /// Directory for the PDF (defaults to the configured download path)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,
    },

    /// Look up one paper by ID
    Details {
        /// Paper ID
        paper_id: String,

        /// Source to query
        #[arg(long, short, value_enum)]
        source: SourceArg,
    },

    /// List available sources and their capabilities
    #[command(alias = "ls")]
    Sources,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_harvest={}", level)),
    );

    let json_layer = cli.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!cli.log_json).then(|| {
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &path {
        tracing::info!("Using config file: {}", path.display());
    }
    load_config(path.as_deref()).context("Failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_settings(&cli)?;
    let registry = SourceRegistry::from_config(&config).context("Failed to build sources")?;
    let format = resolve_format(cli.output);

    match cli.command {
        Commands::Search {
            query,
            source,
            max_results,
            year,
            category,
            lookback_days,
            no_details,
        } => {
            let mut search_query = SearchQuery::new(&query)
                .max_results(max_results)
                .fetch_details(!no_details);
            search_query.year = year;
            search_query.category = category;
            search_query.lookback_days = lookback_days;

            let mut papers = Vec::new();
            for src in get_sources(&registry, source, SourceCapabilities::SEARCH) {
                match src.search(&search_query).await {
                    Ok(response) => {
                        tracing::info!("Found {} papers from {}", response.len(), src.name());
                        papers.extend(response.papers);
                    }
                    Err(e) => tracing::error!("Error searching {}: {}", src.name(), e),
                }
            }
            output_papers(&papers, format)?;
        }

        Commands::Download {
            paper_id,
            source,
            dir,
        } => {
            let src = get_source(&registry, source)?;
            let dir = dir.unwrap_or_else(|| config.downloads.default_path.clone());
            let request = DownloadRequest::new(&paper_id, dir.to_string_lossy());
            let result = src
                .download(&request)
                .await
                .with_context(|| format!("Failed to download {} from {}", paper_id, src.name()))?;
            println!("{}", result.path);
        }

        Commands::Read {
            paper_id,
            source,
            dir,
        } => {
            let src = get_source(&registry, source)?;
            let dir = dir.unwrap_or_else(|| config.downloads.default_path.clone());
            let request = ReadRequest::new(&paper_id, dir.to_string_lossy());
            let result = src
                .read(&request)
                .await
                .with_context(|| format!("Failed to read {} from {}", paper_id, src.name()))?;
            println!("{}", result.text);
        }

        Commands::Details { paper_id, source } => {
            let src = get_source(&registry, source)?;
            let paper = src
                .get_by_id(&paper_id)
                .await
                .with_context(|| format!("Failed to look up {} on {}", paper_id, src.name()))?;
            output_papers(std::slice::from_ref(&paper), format)?;
        }

        Commands::Sources => {
            let mut sources: Vec<_> = registry.all().collect();
            sources.sort_by(|a, b| a.id().cmp(b.id()));
            for src in sources {
                let caps = src.capabilities();
                let mut names = Vec::new();
                for (flag, name) in [
                    (SourceCapabilities::SEARCH, "search"),
                    (SourceCapabilities::DOWNLOAD, "download"),
                    (SourceCapabilities::READ, "read"),
                    (SourceCapabilities::DETAILS, "details"),
                ] {
                    if caps.contains(flag) {
                        names.push(name);
                    }
                }
                println!("{:<16} {:<20} {}", src.id(), src.name(), names.join(", "));
            }
        }
    }

    Ok(())
}

fn get_source(
    registry: &SourceRegistry,
    source: SourceArg,
) -> Result<&Arc<dyn Source>> {
    let source_type = source
        .source_type()
        .context("Please specify a specific source")?;
    Ok(registry.get_required(source_type.id())?)
}

fn get_sources(
    registry: &SourceRegistry,
    source: SourceArg,
    capability: SourceCapabilities,
) -> Vec<&Arc<dyn Source>> {
    match source.source_type() {
        None => {
            let mut sources = registry.with_capability(capability);
            sources.sort_by(|a, b| a.id().cmp(b.id()));
            sources
        }
        Some(source_type) => registry.get(source_type.id()).into_iter().collect(),
    }
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    match format {
        OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Plain,
        OutputFormat::Auto => OutputFormat::Json,
        other => other,
    }
}

fn output_papers(papers: &[Paper], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Plain => {
            for paper in papers {
                let year = paper
                    .published_date
                    .map(|d| d.format("%Y").to_string())
                    .unwrap_or_default();
                println!("{} ({}) [{}]", paper.title, year, paper.source.name());
                println!("  ID: {}", paper.paper_id);
                if !paper.authors.is_empty() {
                    println!("  Authors: {}", paper.authors.join(", "));
                }
                println!("  URL: {}", paper.url);
                if !paper.doi.is_empty() {
                    println!("  DOI: {}", paper.doi);
                }
                if !paper.pdf_url.is_empty() {
                    println!("  PDF: {}", paper.pdf_url);
                }
                println!();
            }
        }
        _ => {
            let records: Vec<PaperRecord> = papers.iter().map(PaperRecord::from).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&records).context("Failed to serialize papers")?
            );
        }
    }
    Ok(())
}
