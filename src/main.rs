//! Gist Task Tracker
//!
//! HTTP task list API whose records live in a single remote gist document.

use anyhow::{Context, Result};
use clap::Parser;
use gist_task_tracker::cli::{Cli, Command, ServeArgs};
use gist_task_tracker::config::Config;
use gist_task_tracker::enrichment::{Enricher, NoopEnricher, WorkersAiEnricher};
use gist_task_tracker::logging::{self, LogTarget};
use gist_task_tracker::remote::GistClient;
use gist_task_tracker::server;
use gist_task_tracker::store::TaskStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Wire the document client and enricher into a store.
fn build_store(config: &Config) -> Result<TaskStore> {
    config.validate()?;
    let documents = Arc::new(GistClient::new(&config.remote)?);

    let enricher: Arc<dyn Enricher> = match WorkersAiEnricher::from_config(&config.enrichment)? {
        Some(enricher) => {
            info!("Enrichment enabled with model {}", config.enrichment.model);
            Arc::new(enricher)
        }
        None => {
            warn!("Enrichment not configured; task names are stored as given");
            Arc::new(NoopEnricher)
        }
    };

    Ok(TaskStore::new(documents, enricher))
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("cannot resolve listen address {}:{}", host, port))?
        .next()
        .with_context(|| format!("no address found for {}:{}", host, port))
}

async fn run_server(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let store = build_store(&config)?;
    let addr = resolve_addr(&config.server.host, config.server.port).await?;

    server::serve(store, addr, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_list(config: Config) -> Result<()> {
    let store = build_store(&config)?;
    let tasks = store.list().await?;
    println!("{}", serde_json::to_string_pretty(&tasks)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let config = Config::load_with_env(cli.config.as_deref().map(Path::new))?;

    match cli.command {
        Some(Command::List) => run_list(config).await?,
        Some(Command::Serve(args)) => run_server(config, args).await?,
        None => run_server(config, ServeArgs::default()).await?,
    }

    Ok(())
}
