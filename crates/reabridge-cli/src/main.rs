//! reabridge CLI - The `reabridge` command.
//!
//! Entry point for the REAPER bridge:
//!
//! - **serve**: HTTP API and WebSocket state stream
//! - **search** / **lookup**: query the knowledge base
//! - **send**: fire one control command at REAPER
//! - **watch**: print state changes reported by REAPER

mod send;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reabridge_core::{Command, Config, ControlEngine, KnowledgeBase, SearchEngine};
use std::path::PathBuf;
use std::sync::Arc;

use send::SendCommand;

/// Bridge between REAPER's OSC control surface and a knowledge assistant
#[derive(Parser, Debug)]
#[command(name = "reabridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Control REAPER over OSC and search the REAPER knowledge base", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.config/reabridge/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// HTTP port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Don't bind the OSC listen port at startup
        #[arg(long)]
        no_connect: bool,
    },

    /// Search the knowledge base
    Search {
        /// Search terms
        #[arg(required = true, value_name = "QUERY")]
        query: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a knowledge section by path, e.g. `extensions.sws`
    Lookup {
        #[arg(value_name = "PATH", default_value = "")]
        path: String,
    },

    /// Send one command to REAPER
    Send {
        #[command(subcommand)]
        command: SendCommand,
    },

    /// Connect and print every state change as JSON
    Watch {
        /// Exit after this many changes
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Create a default configuration file
    Init,

    /// Print the configuration file location
    ConfigPath,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    match args.command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created config file at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Serve { port, no_connect } => {
            let config = load_config(args.config.as_ref())?;
            serve(config, port, no_connect)
        }
        Commands::Search { query, json } => {
            let config = load_config(args.config.as_ref())?;
            search(&config, &query.join(" "), json)
        }
        Commands::Lookup { path } => {
            let config = load_config(args.config.as_ref())?;
            lookup(&config, &path)
        }
        Commands::Send { command } => {
            let config = load_config(args.config.as_ref())?;
            let engine = ControlEngine::new(config.osc.control.clone())?;
            let command: Command = command.into();
            engine.send(&command)?;
            println!("sent {}", command.name());
            Ok(())
        }
        Commands::Watch { count } => {
            let config = load_config(args.config.as_ref())?;
            watch(&config, count)
        }
    }
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env()?;
            Ok(config)
        }
        None => Config::load().context("Failed to load configuration"),
    }
}

fn knowledge(config: &Config) -> Result<Arc<KnowledgeBase>> {
    let kb = KnowledgeBase::load(config.knowledge.path.as_deref())
        .context("Failed to load knowledge document")?;
    Ok(Arc::new(kb))
}

fn serve(config: Config, port: Option<u16>, no_connect: bool) -> Result<()> {
    let kb = knowledge(&config)?;
    let search = Arc::new(SearchEngine::from_settings(kb, &config.search));
    let engine = ControlEngine::new(config.osc.control.clone())?;

    if !no_connect {
        // Commands still go out via one-shot sockets if this fails.
        if let Err(e) = engine.connect(config.osc.connect_timeout()) {
            log::warn!("OSC listener not started: {}", e);
        }
    }

    let osc = engine.config();
    log::info!("OSC configured for {}:{}", osc.host, osc.port);

    let port = port.unwrap_or(config.http.port);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(reabridge_http::start_server(
        engine,
        search,
        port,
        config.osc.connect_timeout(),
    ))
}

fn search(config: &Config, query: &str, json: bool) -> Result<()> {
    let kb = knowledge(config)?;
    let results = reabridge_core::knowledge::search(&kb, query);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(());
    }
    for result in results {
        println!("[{:>2}] {}", result.score, result.path);
        println!("     {}", result.content);
    }
    Ok(())
}

fn lookup(config: &Config, path: &str) -> Result<()> {
    let kb = knowledge(config)?;
    match kb.lookup(path) {
        Some(node) => {
            println!("{}", serde_json::to_string_pretty(node)?);
            Ok(())
        }
        None => {
            let parent = path.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
            let available = kb.section_keys(parent);
            if !available.is_empty() {
                eprintln!("Available: {}", available.join(", "));
            }
            anyhow::bail!("Path not found: {}", path)
        }
    }
}

fn watch(config: &Config, count: Option<usize>) -> Result<()> {
    let engine = ControlEngine::new(config.osc.control.clone())?;
    let local = engine
        .connect(config.osc.connect_timeout())
        .context("Failed to bind OSC listen port")?;
    log::info!("Watching REAPER feedback on {} (Ctrl+C to exit)", local);

    let (_subscription, rx) = engine.subscribe_channel(256);
    println!("{}", serde_json::to_string(&engine.get_state())?);

    let mut seen = 0;
    for state in rx.iter() {
        println!("{}", serde_json::to_string(&state)?);
        seen += 1;
        if count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    engine.disconnect();
    Ok(())
}
