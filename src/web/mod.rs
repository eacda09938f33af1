mod error;
mod pagination;
mod routes;

pub use error::ApiError;
pub use pagination::{ListParams, PageResponse};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::crawler::PaginatedCollector;
use crate::db::Database;
use crate::llm::{CommentAnalyzer, InferenceClient};
use crate::remote::GraphQlClient;

/// Largest `page_size` a list endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub graphql: GraphQlClient,
    pub analyzer: Arc<dyn CommentAnalyzer>,
    pub collector: PaginatedCollector,
}

impl AppState {
    /// Build the state with HTTP clients configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let graphql = GraphQlClient::from_config(&config)?;
        let analyzer = InferenceClient::from_config(&config)?;
        let collector = PaginatedCollector::new(config.crawl_page_size);

        Ok(Self {
            db,
            config: Arc::new(config),
            graphql,
            analyzer: Arc::new(analyzer),
            collector,
        })
    }
}

/// Serve the API until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address is invalid, binding fails, or the server
/// stops with an error.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
