use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use sheets_mcp::config::{find_config_file, load_config, Config, ENV_PREFIX, ENV_VARS};
use sheets_mcp::mcp::McpServer;
use sheets_mcp::ToolKind;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sheets MCP - Google Sheets tools for MCP clients
#[derive(Parser, Debug)]
#[command(name = "sheets-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Expose Google Sheets tools over MCP (streamable HTTP, SSE and stdio)", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (default when no command is given)
    Serve {
        /// Serve over stdin/stdout instead of HTTP
        #[arg(long)]
        stdio: bool,

        /// Port to listen on (overrides PORT and the config file)
        #[arg(long, short)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// List the tools this server exposes
    Tools {
        /// Print full descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

fn print_env_vars() {
    println!("Environment variables:");
    println!();
    for (var, key) in ENV_VARS {
        println!("  {:<28}{}", var, key);
    }
    println!();
    println!("Any setting can also be given as {}_<SECTION>__<KEY>, e.g.:", ENV_PREFIX);
    println!("  export {}_GOOGLE__FOLDER_ID=\"1AbCdEfGh\"", ENV_PREFIX);
    println!("  export {}_SERVER__PORT=9000", ENV_PREFIX);
    println!();
    println!("  RUST_LOG                    Log filter (e.g., sheets_mcp=debug)");
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("sheets_mcp={}", env_filter)),
    ));

    // stderr keeps stdout clean for the stdio transport
    match cli.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn print_tools(json: bool) -> Result<()> {
    if json {
        let descriptors: Vec<_> = ToolKind::ALL.into_iter().map(ToolKind::descriptor).collect();
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Title", "Description"]);
    for kind in ToolKind::ALL {
        table.add_row(vec![kind.name(), kind.title(), kind.description()]);
    }
    println!("{table}");
    Ok(())
}

async fn serve(mut config: Config, stdio: bool, port: Option<u16>, host: Option<String>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    let server = McpServer::from_config(&config)?;

    if stdio {
        server.run_stdio().await?;
        return Ok(());
    }

    let addr = config.server.bind_addr();
    tracing::info!("Running MCP server in HTTP/SSE mode on {}", addr);
    let (_bound, handle) = server
        .run_http(&addr)
        .await
        .with_context(|| format!("Could not start HTTP server on {}", addr))?;

    tokio::select! {
        result = handle => {
            result.map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
        return Ok(());
    }

    init_tracing(&cli);

    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        None => serve(config, false, None, None).await,
        Some(Commands::Serve { stdio, port, host }) => serve(config, stdio, port, host).await,
        Some(Commands::Tools { json }) => print_tools(json),
        Some(Commands::Config) => {
            println!("{}", config.redacted().to_toml()?);
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "sheets-mcp",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
