//! cascade-node: cascading performance-plan service
//!
//! Serves the JSON dashboard by default; any other subcommand runs once
//! against the same gateway and exits.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use cascade_node::assist;
use cascade_node::cli::{self, CliContext, Commands};
use cascade_node::config::{process_env, resolve_assist_key, resolve_backend, Config};
use cascade_node::dashboard::{create_router, DashboardState};
use cascade_node::gateway::Gateway;
use cascade_node::store::LocalStore;

#[derive(Parser)]
#[command(name = "cascade-node")]
#[command(about = "Cascading performance plans over a staff hierarchy")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cascade-node.toml")]
    config: String,

    /// Data directory for local settings
    #[arg(short, long, env = "CASCADE_DATA_DIR")]
    data_dir: Option<String>,

    /// Log level for this crate (trace, debug, info, warn, error)
    #[arg(long, env = "CASCADE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// HTTP port (overrides config file)
    #[arg(long, env = "CASCADE_HTTP_PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("cascade_node={}", cli.log_level).parse()?),
        )
        .init();

    let mut config = Config::load(Path::new(&cli.config))?;
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = PathBuf::from(data_dir);
    }
    if let Some(port) = cli.port {
        config.api.http_port = port;
    }
    info!("Data dir: {}", config.node.data_dir.display());

    let store = Arc::new(LocalStore::open(&config.local_db_path())?);
    let backend = resolve_backend(store.backend_override()?, process_env);
    let gateway = Arc::new(Gateway::open(backend.as_ref().map(|b| &b.endpoint)).await?);
    if let Some(notice) = gateway.fallback_notice() {
        warn!("{}", notice);
    }
    let suggester = assist::from_config(&config.assist, resolve_assist_key(process_env));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {}
        command => {
            let ctx = CliContext {
                gateway: &gateway,
                store: &store,
                suggester: suggester.as_ref(),
                backend: backend.as_ref(),
            };
            match cli::execute_command(&ctx, command).await {
                Ok(output) => {
                    println!("{}", output.trim_end());
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    let port = config.api.http_port;
    let state = Arc::new(DashboardState::new(config, gateway, suggester, store, backend));
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Dashboard listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
