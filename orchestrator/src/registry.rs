//! Owns agent instances and their lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::agents::{Agent, AgentContext};
use crate::error::AgentError;

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes `agent` and adds it under its id.
    ///
    /// The write lock is held across initialization, so a failing agent
    /// leaves the registry untouched. Duplicate ids are rejected and the
    /// already registered agent stays in place.
    pub async fn register(&self, agent: Arc<dyn Agent>) -> Result<(), AgentError> {
        let id = agent.id().to_string();
        let mut agents = self.agents.write().await;

        if agents.contains_key(&id) {
            warn!(agent = %id, "Rejecting duplicate agent registration");
            return Err(AgentError::AlreadyRegistered(id));
        }

        agent.initialize(&AgentContext::background()).await?;

        agents.insert(id.clone(), agent);
        info!(agent = %id, "Agent registered and initialized");
        Ok(())
    }

    pub async fn lookup(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(name).cloned()
    }

    /// Registered agent names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Runs every agent's shutdown hook and empties the registry.
    pub async fn shutdown_all(&self) {
        let drained: Vec<Arc<dyn Agent>> = {
            let mut agents = self.agents.write().await;
            agents.drain().map(|(_, agent)| agent).collect()
        };

        let ctx = AgentContext::background();
        let results = futures::future::join_all(drained.iter().map(|agent| agent.shutdown(&ctx))).await;

        for (agent, result) in drained.iter().zip(results) {
            match result {
                Ok(()) => info!(agent = %agent.id(), "Agent shut down"),
                Err(e) => warn!(agent = %agent.id(), error = %e, "Agent shutdown failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{AgentMessage, AgentResponse, ResponsePayload};

    struct TestAgent {
        id: &'static str,
        fail_init: bool,
        shutdowns: Arc<AtomicUsize>,
    }

    impl TestAgent {
        fn new(id: &'static str) -> Self {
            Self {
                id,
                fail_init: false,
                shutdowns: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(id: &'static str) -> Self {
            Self {
                fail_init: true,
                ..Self::new(id)
            }
        }
    }

    #[async_trait]
    impl Agent for TestAgent {
        fn id(&self) -> &str {
            self.id
        }

        async fn initialize(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
            if self.fail_init {
                return Err(AgentError::initialization(self.id, "catalog missing"));
            }
            Ok(())
        }

        async fn process(
            &self,
            _ctx: &AgentContext,
            message: AgentMessage,
        ) -> Result<AgentResponse, AgentError> {
            Ok(AgentResponse::success(message.id, self.id, ResponsePayload::Empty))
        }

        async fn shutdown(&self, _ctx: &AgentContext) -> Result<(), AgentError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn registers_and_looks_up_agents() {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(TestAgent::new("b_agent"))).await.unwrap();
        registry.register(Arc::new(TestAgent::new("a_agent"))).await.unwrap();

        assert!(registry.lookup("a_agent").await.is_some());
        assert!(registry.lookup("missing").await.is_none());
        assert_eq!(registry.list().await, ["a_agent", "b_agent"]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn failed_initialization_leaves_registry_unchanged() {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(TestAgent::new("a_agent"))).await.unwrap();

        let result = registry.register(Arc::new(TestAgent::failing("b_agent"))).await;
        assert!(matches!(result, Err(AgentError::Initialization { .. })));
        assert_eq!(registry.list().await, ["a_agent"]);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = AgentRegistry::new();
        let first = TestAgent::new("search_agent");
        let first_shutdowns = first.shutdowns.clone();
        registry.register(Arc::new(first)).await.unwrap();

        let result = registry.register(Arc::new(TestAgent::new("search_agent"))).await;
        assert!(matches!(result, Err(AgentError::AlreadyRegistered(name)) if name == "search_agent"));
        assert_eq!(registry.list().await, ["search_agent"]);

        // The original instance is still the one registered.
        registry.shutdown_all().await;
        assert_eq!(first_shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_all_empties_the_registry() {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(TestAgent::new("a_agent"))).await.unwrap();
        registry.shutdown_all().await;
        assert!(registry.is_empty().await);
    }
}
