use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::AgentError;
use crate::llm::TextGenerator;
use crate::models::{AgentMessage, AgentResponse};

pub mod inventory;
pub mod recommendation;
pub mod search;

pub use inventory::InventoryAgent;
pub use recommendation::RecommendationAgent;
pub use search::SearchAgent;

// Well-known agent names
pub const ORCHESTRATOR: &str = "orchestrator";
pub const SEARCH_AGENT: &str = "search_agent";
pub const INVENTORY_AGENT: &str = "inventory_agent";
pub const RECOMMENDATION_AGENT: &str = "recommendation_agent";

/// An independently addressable worker.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    async fn initialize(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        Ok(())
    }

    async fn process(
        &self,
        ctx: &AgentContext,
        message: AgentMessage,
    ) -> Result<AgentResponse, AgentError>;

    async fn shutdown(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Per-call context handed to agents: carries the caller's cancellation.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// A context nobody will cancel (lifecycle hooks, bus dispatch).
    pub fn background() -> Self {
        Self::default()
    }

    /// Races `fut` against cancellation.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, AgentError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            output = fut => Ok(output),
        }
    }
}

/// The search → inventory → recommendation agents used by the service.
pub fn default_agents(config: &Config, generator: Arc<dyn TextGenerator>) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(InventoryAgent::new()),
        Arc::new(SearchAgent::new(&config.catalog_path, generator)),
        Arc::new(RecommendationAgent::new()),
    ]
}
