use std::sync::Arc;

use tracing::{info, warn};
use warp::Filter;

use celeste::agents;
use celeste::api;
use celeste::bus::MessageBus;
use celeste::config::Config;
use celeste::context::ContextStore;
use celeste::error::handle_rejection;
use celeste::llm::{DisabledGenerator, GeminiClient, TextGenerator};
use celeste::metrics;
use celeste::middleware;
use celeste::registry::AgentRegistry;
use celeste::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!("Starting Celeste multi-agent shopping assistant");

    // Text generation is optional; without a key every caller uses its fallback.
    let generator: Arc<dyn TextGenerator> = match config.gemini_api_key() {
        Some(key) => Arc::new(GeminiClient::new(
            key,
            &config.gemini_base_url,
            &config.gemini_model,
            config.generation_timeout(),
        )?),
        None => {
            warn!("GEMINI_API_KEY not set, text generation disabled");
            Arc::new(DisabledGenerator)
        }
    };

    // Register agents
    let registry = Arc::new(AgentRegistry::new());
    for agent in agents::default_agents(&config, generator.clone()) {
        registry.register(agent).await?;
    }
    info!(agents = registry.len().await, "Agent registry initialized");

    let (bus, dispatcher) = MessageBus::spawn(registry.clone(), config.bus_settings());
    let contexts = Arc::new(ContextStore::new(config.context_settings()));

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        contexts,
        bus,
        generator,
        config.workflow_settings(),
    ));

    // Build API routes
    let api_routes = api::routes(orchestrator.clone())
        .with(warp::log("api"))
        .with(middleware::cors());

    // Metrics route
    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .map(|| match metrics::render() {
            Ok((buffer, content_type)) => warp::reply::with_status(
                warp::reply::with_header(buffer, "Content-Type", content_type),
                warp::http::StatusCode::OK,
            ),
            Err(e) => warp::reply::with_status(
                warp::reply::with_header(
                    e.to_string().into_bytes(),
                    "Content-Type",
                    "text/plain".to_string(),
                ),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ),
        });

    let routes = metrics_route.or(api_routes).recover(handle_rejection);

    // Start server
    let addr = ([0, 0, 0, 0], config.port);
    let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, async {
        let _ = tokio::signal::ctrl_c().await;
    })?;
    info!("Server listening on {}", bound);

    server.await;

    info!("Shutting down agents");
    orchestrator.shutdown().await;
    drop(orchestrator);
    dispatcher.abort();

    Ok(())
}
