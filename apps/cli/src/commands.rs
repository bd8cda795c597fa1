//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use doc2md_api::AppState;
use doc2md_core::Converter;
use doc2md_mcp::McpServer;
use doc2md_shared::{AppConfig, config_file_path, init_config, load_config, load_config_from};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Doc2MD: convert documents and web pages to Markdown.
#[derive(Parser)]
#[command(
    name = "doc2md",
    version,
    about = "Convert web pages, PDF, Word, and HTML documents to clean Markdown.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.doc2md/doc2md.toml).
    #[arg(long, env = "DOC2MD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the REST API server.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config and $PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// MCP tool server for AI agents.
    #[command(name = "mcp")]
    Mcp {
        #[command(subcommand)]
        action: McpAction,
    },

    /// Convert a single input and print the Markdown.
    Convert {
        /// Write the Markdown to a file instead of stdout.
        #[arg(short, long, global = true)]
        output: Option<PathBuf>,

        #[command(subcommand)]
        source: ConvertSource,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// MCP server subcommands.
#[derive(Subcommand)]
pub(crate) enum McpAction {
    /// Serve MCP over stdin/stdout.
    Serve,

    /// Print a client configuration snippet for this binary.
    Config {
        /// Target client: vscode, claude-desktop, or cursor.
        target: String,
    },
}

/// Inputs accepted by `convert`.
#[derive(Subcommand)]
pub(crate) enum ConvertSource {
    /// Fetch a URL through the fallback chain.
    Url {
        url: String,

        /// Request timeout in seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Do not fall back to markdown.new.
        #[arg(long)]
        no_fallback: bool,

        /// Ask markdown.new before fetching the page.
        #[arg(long)]
        prefer_markdown_new: bool,
    },

    /// Convert a PDF file.
    Pdf { path: PathBuf },

    /// Convert a Word (.docx) file.
    Docx { path: PathBuf },

    /// Convert an HTML file.
    Html {
        path: PathBuf,

        /// Base URL for resolving relative links.
        #[arg(long)]
        base_url: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file.
    Init,
    /// Print the resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize tracing. Logs always go to stderr; stdout carries Markdown or
/// MCP messages.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "doc2md=info",
        1 => "doc2md=debug,tower_http=debug",
        _ => "doc2md=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => cmd_serve(config, host, port).await,
        Command::Mcp { action } => match action {
            McpAction::Serve => cmd_mcp_serve(config).await,
            McpAction::Config { target } => cmd_mcp_config(&target),
        },
        Command::Convert { output, source } => {
            let markdown = cmd_convert(config, source).await?;
            write_output(&markdown, output.as_deref())
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

/// Load the config file (explicit path or default location) and apply
/// environment overrides.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.apply_env()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let converter = Converter::new(config.fetch.clone())?;
    let state = AppState::new(converter, config.server.max_upload_bytes());
    let addr = config.server.bind_addr();

    doc2md_api::serve(&addr, state)
        .await
        .wrap_err_with(|| format!("API server on {addr} failed"))?;
    Ok(())
}

async fn cmd_mcp_serve(config: AppConfig) -> Result<()> {
    let converter = Converter::new(config.fetch)?;
    McpServer::new(converter, config.mcp.max_output_chars)
        .serve_stdio()
        .await
        .wrap_err("MCP server failed")?;
    Ok(())
}

fn cmd_mcp_config(target: &str) -> Result<()> {
    let exe = std::env::current_exe()
        .map_err(|e| eyre!("cannot determine path of the doc2md binary: {e}"))?;
    let command = exe.to_string_lossy().to_string();
    let args = serde_json::json!(["mcp", "serve"]);

    let (comment, config) = match target {
        "vscode" => (
            "// .vscode/mcp.json",
            serde_json::json!({
                "servers": {
                    "doc2md": { "type": "stdio", "command": command, "args": args }
                }
            }),
        ),
        "claude-desktop" => (
            "// claude_desktop_config.json",
            serde_json::json!({
                "mcpServers": { "doc2md": { "command": command, "args": args } }
            }),
        ),
        "cursor" => (
            "// Cursor MCP settings",
            serde_json::json!({
                "mcpServers": { "doc2md": { "command": command, "args": args } }
            }),
        ),
        _ => {
            return Err(eyre!(
                "unknown config target '{target}': expected 'vscode', 'claude-desktop', or 'cursor'"
            ));
        }
    };

    println!("{comment}");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn cmd_convert(mut config: AppConfig, source: ConvertSource) -> Result<String> {
    if let ConvertSource::Url {
        no_fallback,
        prefer_markdown_new,
        ..
    } = &source
    {
        config.fetch.use_fallback &= !*no_fallback;
        config.fetch.prefer_markdown_new |= *prefer_markdown_new;
    }

    let converter = Converter::new(config.fetch)?;

    let markdown = match source {
        ConvertSource::Url { url, timeout, .. } => {
            let timeout = timeout
                .map(|secs| {
                    if secs.is_finite() && secs > 0.0 {
                        Ok(Duration::from_secs_f64(secs))
                    } else {
                        Err(eyre!("--timeout must be a positive number of seconds"))
                    }
                })
                .transpose()?;
            let conversion = converter.convert_url(&url, timeout).await?;
            info!(%url, tier = %conversion.tier, "converted");
            conversion.markdown
        }
        ConvertSource::Pdf { path } => converter.convert_pdf(&read_file(&path)?)?.markdown,
        ConvertSource::Docx { path } => converter.convert_docx(&read_file(&path)?)?.markdown,
        ConvertSource::Html { path, base_url } => {
            let html = String::from_utf8_lossy(&read_file(&path)?).into_owned();
            converter.convert_html(&html, base_url.as_deref())?.markdown
        }
    };

    Ok(markdown)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).wrap_err_with(|| format!("cannot read {}", path.display()))
}

fn write_output(markdown: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, format!("{markdown}\n"))
                .wrap_err_with(|| format!("cannot write {}", path.display()))?;
            info!(path = %path.display(), chars = markdown.chars().count(), "markdown written");
        }
        None => println!("{markdown}"),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = config_file_path()?;
    if path.exists() {
        return Err(eyre!("config already exists at {}", path.display()));
    }
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
