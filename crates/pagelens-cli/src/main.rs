use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pagelens_core::{FetchOptions, DEFAULT_MAX_BYTES, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_MS};
use pagelens_local::{ScrapeOptions, SearchOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagelens")]
#[command(about = "Fetch a page or a search results page and print what it contains (json)", long_about = None)]
struct Cli {
    #[command(flatten)]
    fetch: FetchArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// Deadline for the whole fetch, in milliseconds.
    #[arg(long, global = true, env = "PAGELENS_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
    /// Redirect hops followed before giving up.
    #[arg(long, global = true, env = "PAGELENS_MAX_REDIRECTS", default_value_t = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,
    /// Cap on response body bytes read.
    #[arg(long, global = true, env = "PAGELENS_MAX_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    max_bytes: u64,
}

impl FetchArgs {
    fn options(&self) -> FetchOptions {
        FetchOptions {
            timeout_ms: self.timeout_ms,
            max_redirects: self.max_redirects,
            max_bytes: self.max_bytes,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch one page and print its extraction record.
    Scrape {
        /// Absolute http(s) URL.
        url: String,
        /// Keep `<header>` regions in the text excerpt.
        #[arg(long)]
        keep_header: bool,
    },
    /// Search the web (DuckDuckGo HTML) and print up to 10 results.
    Search {
        query: String,
        /// Results endpoint (the query is appended as `?q=`).
        #[arg(long, env = "PAGELENS_SEARCH_ENDPOINT")]
        endpoint: Option<String>,
    },
    /// Print version info.
    Version(VersionCmd),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format.
    #[arg(long = "output", alias = "format", value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,
}

fn exit_code(e: &pagelens_core::Error) -> i32 {
    match e.kind() {
        "invalid_input" => 2,
        "blocked" => 3,
        _ => 4,
    }
}

fn fail(e: pagelens_core::Error) -> ! {
    let v = serde_json::json!({
        "ok": false,
        "error": { "kind": e.kind(), "message": e.to_string() },
    });
    println!("{v}");
    std::process::exit(exit_code(&e));
}

fn init_tracing() {
    // Logs go to stderr; stdout carries only the JSON result.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let fetch = cli.fetch.options();

    match cli.command {
        Commands::Scrape { url, keep_header } => {
            let mut opts = ScrapeOptions {
                fetch,
                ..ScrapeOptions::default()
            };
            opts.summary.strip_header = !keep_header;
            match pagelens_local::scrape_page(&url, &opts).await {
                Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                Err(e) => fail(e),
            }
        }
        Commands::Search { query, endpoint } => {
            let mut opts = SearchOptions {
                fetch,
                ..SearchOptions::default()
            };
            if let Some(ep) = endpoint.filter(|s| !s.trim().is_empty()) {
                opts.endpoint = ep.trim().to_string();
            }
            match pagelens_local::search_web(&query, &opts).await {
                Ok(results) => {
                    let v = serde_json::json!({ "query": query, "results": results });
                    println!("{}", serde_json::to_string_pretty(&v)?);
                }
                Err(e) => fail(e),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "pagelens",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output {
                OutputFormat::Text => println!("pagelens {}", env!("CARGO_PKG_VERSION")),
                OutputFormat::Json => println!("{v}"),
            }
        }
    }
    Ok(())
}
