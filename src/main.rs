use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use rustdoc_search::cli::{Cli, Commands};
use rustdoc_search::config::SearchConfig;
use rustdoc_search::server::SearchServer;
use rustdoc_search::state::IndexState;
use rustdoc_search::tools::search::{SearchRequest, handle_search};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustdoc_search::tracing::init();
    let cli = Cli::parse();

    let mut config = SearchConfig::load(cli.config.as_deref()).await?;
    if let Some(index) = cli.index {
        config.index_path = Some(index);
    }
    let state = Arc::new(IndexState::new(config));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state).await,
        Commands::Query {
            query,
            crate_name,
            limit,
        } => {
            let request = SearchRequest {
                query,
                crate_name,
                limit,
            };
            let output = handle_search(&state, request)
                .await
                .map_err(anyhow::Error::msg)?;
            print!("{output}");
            Ok(())
        }
    }
}

async fn serve(state: Arc<IndexState>) -> anyhow::Result<()> {
    tracing::info!("Starting rustdoc-search MCP server");

    if state.config().index_path.is_some() {
        // preload the configured index
        let warm = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = warm.active().await {
                tracing::warn!(error = %e, "failed to preload configured index");
            }
        });
    }

    let service = SearchServer::with_state(state)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("Error serving MCP server: {:?}", e);
        })?;
    service.waiting().await?;
    Ok(())
}
