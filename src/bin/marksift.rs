//! CLI binary for marksift.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and either runs a one-shot extraction or serves the
//! HTTP API.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use marksift::{extract, extract_from_markdown, ApiEnvelope, ExtractionConfig, ExtractionMode};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # One-shot: crawl a URL and print the {code, data, msg} envelope
  marksift extract https://news.example.net/article

  # Heuristic only (no LLM, no API key needed)
  marksift extract --mode heuristic-only https://news.example.net/article

  # Extract from Markdown already on disk (skips the crawler)
  marksift extract --from-file page.md

  # Run the HTTP service
  marksift serve --host 0.0.0.0 --port 8008

  # Point at a different crawler deployment and model
  marksift serve --crawler-url http://crawler:3002/v1 --provider ollama --model deepseek-r1:8b

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY           OpenAI-compatible API key (auto-detection)
  MARKSIFT_CRAWLER_URL     Crawler API base URL
  MARKSIFT_PROVIDER        LLM provider (openai, ollama, ...)
  MARKSIFT_MODEL           LLM model id
  RUST_LOG                 Tracing filter (overrides -v/-q)

SETUP:
  1. Start a Firecrawl-compatible crawler (default: http://localhost:3002/v1)
  2. Optionally set an LLM API key — without one, extraction falls back to
     the built-in regex pairing heuristic.
"#;

/// Crawl URLs to Markdown and sift them into paired text/image items.
#[derive(Parser, Debug)]
#[command(
    name = "marksift",
    version,
    about = "Crawl URLs to Markdown and sift them into paired text/image items",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one URL and print the result envelope as JSON.
    Extract {
        /// Target page URL. Omit when using --from-file.
        url: Option<String>,

        /// Read Markdown from this file instead of crawling.
        #[arg(long, conflicts_with = "url")]
        from_file: Option<PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,

        /// Print run statistics to stderr.
        #[arg(long)]
        stats: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Serve the extraction HTTP API.
    Serve {
        /// Bind address.
        #[arg(long, env = "MARKSIFT_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Bind port.
        #[arg(long, env = "MARKSIFT_PORT", default_value_t = 8008)]
        port: u16,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Pipeline knobs shared by both subcommands.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Crawler API base URL.
    #[arg(long, env = "MARKSIFT_CRAWLER_URL", default_value = "http://localhost:3002/v1")]
    crawler_url: String,

    /// Page limit passed to the crawler.
    #[arg(long, env = "MARKSIFT_CRAWL_LIMIT", default_value_t = 2000)]
    crawl_limit: u32,

    /// Maximum poll attempts against the crawl-status URL.
    #[arg(long, env = "MARKSIFT_MAX_POLL_ATTEMPTS", default_value_t = 30)]
    max_poll_attempts: u32,

    /// Delay between poll attempts in milliseconds.
    #[arg(long, env = "MARKSIFT_POLL_INTERVAL_MS", default_value_t = 3000)]
    poll_interval_ms: u64,

    /// Poll attempts before partial (still-scraping) content may be used.
    #[arg(long, env = "MARKSIFT_MIN_PARTIAL_ATTEMPTS", default_value_t = 15)]
    min_partial_attempts: u32,

    /// LLM provider: openai, ollama, or any the provider factory knows.
    #[arg(long, env = "MARKSIFT_PROVIDER")]
    provider: Option<String>,

    /// LLM model id (e.g. moonshot-v1-8k, deepseek-r1:8b).
    #[arg(long, env = "MARKSIFT_MODEL")]
    model: Option<String>,

    /// Extraction mode.
    #[arg(long, env = "MARKSIFT_MODE", value_enum, default_value = "heuristic-first")]
    mode: ModeArg,

    /// LLM sampling temperature (0.0–2.0).
    #[arg(long, env = "MARKSIFT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "MARKSIFT_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// Retries on LLM failure.
    #[arg(long, env = "MARKSIFT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Character budget for Markdown sent to the LLM.
    #[arg(long, env = "MARKSIFT_MAX_MARKDOWN_CHARS", default_value_t = 10_000)]
    max_markdown_chars: usize,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    HeuristicFirst,
    LlmFirst,
    HeuristicOnly,
}

impl From<ModeArg> for ExtractionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::HeuristicFirst => ExtractionMode::HeuristicFirst,
            ModeArg::LlmFirst => ExtractionMode::LlmFirst,
            ModeArg::HeuristicOnly => ExtractionMode::HeuristicOnly,
        }
    }
}

impl ConfigArgs {
    fn build(&self) -> Result<ExtractionConfig> {
        let mut builder = ExtractionConfig::builder()
            .crawler_base_url(&self.crawler_url)
            .crawl_limit(self.crawl_limit)
            .max_poll_attempts(self.max_poll_attempts)
            .poll_interval_ms(self.poll_interval_ms)
            .min_poll_attempts_for_partial(self.min_partial_attempts.min(self.max_poll_attempts))
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .max_retries(self.max_retries)
            .max_markdown_chars(self.max_markdown_chars)
            .mode(self.mode.into());

        if let Some(ref provider) = self.provider {
            builder = builder.provider_name(provider);
        }
        if let Some(ref model) = self.model {
            builder = builder.model(model);
        }

        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Extract {
            url,
            from_file,
            pretty,
            stats,
            config,
        } => run_extract(url, from_file, pretty, stats, &config, cli.quiet).await,
        Command::Serve { host, port, config } => run_serve(&host, port, &config).await,
    }
}

async fn run_extract(
    url: Option<String>,
    from_file: Option<PathBuf>,
    pretty: bool,
    stats: bool,
    config_args: &ConfigArgs,
    quiet: bool,
) -> Result<()> {
    let config = config_args.build()?;

    let spinner = if quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let output = match (url, from_file) {
        (Some(url), None) => {
            if let Some(ref bar) = spinner {
                bar.set_message(format!("crawling {url}"));
            }
            extract(&url, &config).await
        }
        (None, Some(path)) => {
            let markdown = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if let Some(ref bar) = spinner {
                bar.set_message(format!("processing {}", path.display()));
            }
            extract_from_markdown(&markdown, &config).await
        }
        _ => anyhow::bail!("Provide a URL or --from-file <PATH>"),
    };

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let output = output.context("Extraction failed")?;

    if stats {
        eprintln!(
            "{} items via {:?}  —  {} poll attempts, {} in / {} out tokens, {}ms total",
            output.items.len(),
            output.source,
            output.stats.poll_attempts,
            output.stats.input_tokens,
            output.stats.output_tokens,
            output.stats.total_duration_ms,
        );
    }

    let envelope = ApiEnvelope::from(output);
    let json = if pretty {
        serde_json::to_string_pretty(&envelope)
    } else {
        serde_json::to_string(&envelope)
    }
    .context("Failed to serialise output")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(json.as_bytes()).context("Failed to write to stdout")?;
    handle.write_all(b"\n").ok();

    Ok(())
}

async fn run_serve(host: &str, port: u16, config_args: &ConfigArgs) -> Result<()> {
    let config = config_args.build()?;
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid bind address {host}:{port}"))?;

    marksift::server::serve(addr, config)
        .await
        .context("Server failed")
}
