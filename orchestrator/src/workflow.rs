//! Sequential workflow driver.
//!
//! One user query fans out over an ordered list of [`Stage`]s (search, then
//! inventory, then recommendation). Each stage calls its agent directly with a
//! per-call deadline. Only required stages abort the run; the others degrade
//! to an empty response. The outputs are then fanned back into a single
//! [`CelesteResponse`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::agents::{
    AgentContext, INVENTORY_AGENT, ORCHESTRATOR, RECOMMENDATION_AGENT, SEARCH_AGENT,
};
use crate::bus::{DeliveryStatus, MessageBus};
use crate::context::ContextStore;
use crate::error::{AgentError, OrchestratorError, StageError};
use crate::llm::TextGenerator;
use crate::metrics::{STAGE_FAILURES, WORKFLOW_DURATION, WORKFLOW_RUNS};
use crate::models::{
    AgentMessage, AgentResponse, CelesteResponse, InventoryReport, MessagePayload,
    RecommendationInput, Recommendations, ResponsePayload, SearchQuery, SearchResults,
    UserContext,
};
use crate::registry::AgentRegistry;

pub const DEFAULT_ACTIONS: [&str; 3] = ["Browse similar items", "Add to wishlist", "Get size guidance"];
pub const FALLBACK_MESSAGE: &str =
    "I've coordinated multiple agents to find the best options for you!";
pub const LAST_INTENT_KEY: &str = "last_intent";

#[derive(Debug, Clone, Copy)]
pub struct WorkflowSettings {
    pub agent_timeout: Duration,
    pub generation_timeout: Duration,
    pub history_limit: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(20),
            history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    SearchDone,
    InventoryAttempted,
    RecommendationAttempted,
    Synthesized,
    Failed,
}

/// One step of the pipeline.
#[derive(Clone)]
pub struct Stage {
    pub agent: &'static str,
    /// Suffix of the message id (`<workflow_id>_<label>`).
    pub label: &'static str,
    /// A failing required stage aborts the whole run.
    pub required: bool,
    /// State the run moves to once this stage has been attempted.
    pub reached: PipelineState,
    pub build: fn(&WorkflowRun) -> Option<MessagePayload>,
}

impl Stage {
    pub fn default_pipeline() -> Vec<Stage> {
        vec![
            Stage {
                agent: SEARCH_AGENT,
                label: "search",
                required: true,
                reached: PipelineState::SearchDone,
                build: |run| {
                    Some(MessagePayload::ProductSearch(SearchQuery {
                        query: run.query.clone(),
                    }))
                },
            },
            Stage {
                agent: INVENTORY_AGENT,
                label: "inventory",
                required: false,
                reached: PipelineState::InventoryAttempted,
                build: |run| {
                    run.search_results()
                        .cloned()
                        .map(MessagePayload::CheckInventory)
                },
            },
            Stage {
                agent: RECOMMENDATION_AGENT,
                label: "recommendations",
                required: false,
                reached: PipelineState::RecommendationAttempted,
                build: |run| {
                    run.search_results().cloned().map(|search_results| {
                        MessagePayload::PersonalizedRecommendations(RecommendationInput {
                            search_results,
                            inventory_info: run.inventory_report().cloned(),
                        })
                    })
                },
            },
        ]
    }
}

/// Transient state of one pipeline run.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: String,
    pub query: String,
    pub state: PipelineState,
    /// Agents that contributed, in order.
    pub agent_path: Vec<String>,
    /// Every attempted stage's response, degraded stand-ins included.
    pub outputs: Vec<AgentResponse>,
}

impl WorkflowRun {
    pub fn new(user_id: &str, query: &str) -> Self {
        Self {
            id: format!("workflow_{}_{}", user_id, Uuid::new_v4().simple()),
            query: query.to_string(),
            state: PipelineState::Start,
            agent_path: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn search_results(&self) -> Option<&SearchResults> {
        self.outputs.iter().find_map(|r| match &r.payload {
            ResponsePayload::SearchResults(results) => Some(results),
            _ => None,
        })
    }

    pub fn inventory_report(&self) -> Option<&InventoryReport> {
        self.outputs.iter().find_map(|r| match &r.payload {
            ResponsePayload::InventoryStatus(report) => Some(report),
            _ => None,
        })
    }

    pub fn recommendations(&self) -> Option<&Recommendations> {
        self.outputs.iter().find_map(|r| match &r.payload {
            ResponsePayload::PersonalizedRecommendations(recs) => Some(recs),
            _ => None,
        })
    }

    fn message_id(&self, stage: &Stage) -> String {
        format!("{}_{}", self.id, stage.label)
    }
}

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    contexts: Arc<ContextStore>,
    bus: MessageBus,
    generator: Arc<dyn TextGenerator>,
    stages: Vec<Stage>,
    settings: WorkflowSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        contexts: Arc<ContextStore>,
        bus: MessageBus,
        generator: Arc<dyn TextGenerator>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            registry,
            contexts,
            bus,
            generator,
            stages: Stage::default_pipeline(),
            settings,
        }
    }

    /// Replaces the default search/inventory/recommendation pipeline.
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    pub async fn list_agents(&self) -> Vec<String> {
        self.registry.list().await
    }

    pub async fn has_agent(&self, name: &str) -> bool {
        self.registry.lookup(name).await.is_some()
    }

    pub async fn user_context(&self, user_id: &str) -> Option<UserContext> {
        self.contexts.get(user_id).await
    }

    /// Fire-and-forget delivery through the message bus.
    pub async fn dispatch(&self, message: AgentMessage) -> DeliveryStatus {
        self.bus.send(message).await
    }

    pub async fn process_user_request(
        &self,
        user_id: &str,
        query: &str,
    ) -> Result<CelesteResponse, OrchestratorError> {
        self.process_user_request_cancellable(user_id, query, &CancellationToken::new())
            .await
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn process_user_request_cancellable(
        &self,
        user_id: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<CelesteResponse, OrchestratorError> {
        let started = Instant::now();
        let result = self.run_pipeline(user_id, query, cancel).await;
        WORKFLOW_DURATION.observe(started.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(_) => "completed",
            Err(OrchestratorError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        WORKFLOW_RUNS.with_label_values(&[outcome]).inc();
        result
    }

    async fn run_pipeline(
        &self,
        user_id: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<CelesteResponse, OrchestratorError> {
        let history_limit = self.settings.history_limit;
        let user_context = self
            .contexts
            .update(user_id, |ctx| ctx.record_query(query, history_limit))
            .await;

        let mut run = WorkflowRun::new(user_id, query);
        info!(workflow_id = %run.id, "Starting workflow");

        for stage in &self.stages {
            let message_id = run.message_id(stage);
            match self.run_stage(stage, &run, &user_context, cancel).await {
                Ok(response) => {
                    debug!(workflow_id = %run.id, agent = stage.agent, "Stage succeeded");
                    run.agent_path.push(stage.agent.to_string());
                    run.outputs.push(response);
                }
                Err(StageError::Cancelled | StageError::Agent(AgentError::Cancelled)) => {
                    warn!(workflow_id = %run.id, agent = stage.agent, state = ?run.state, "Workflow cancelled");
                    run.state = PipelineState::Failed;
                    return Err(OrchestratorError::Cancelled);
                }
                Err(e) if stage.required => {
                    error!(workflow_id = %run.id, agent = stage.agent, error = %e, "Required stage failed");
                    STAGE_FAILURES.with_label_values(&[stage.agent]).inc();
                    run.state = PipelineState::Failed;
                    return Err(OrchestratorError::StageFailure {
                        agent: stage.agent.to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(workflow_id = %run.id, agent = stage.agent, error = %e, "Stage failed, continuing degraded");
                    STAGE_FAILURES.with_label_values(&[stage.agent]).inc();
                    run.outputs.push(AgentResponse::degraded(message_id, stage.agent));
                }
            }
            run.state = stage.reached;
        }

        let response = self.synthesize(&run, cancel).await?;
        run.state = PipelineState::Synthesized;

        if let Some(intent) = run.search_results().map(|results| results.intent) {
            self.contexts
                .update(user_id, |ctx| {
                    ctx.preferences
                        .insert(LAST_INTENT_KEY.to_string(), intent.to_string());
                })
                .await;
        }

        info!(
            workflow_id = %run.id,
            state = ?run.state,
            agent_path = ?run.agent_path,
            personalized = response.personalized,
            "Workflow complete"
        );
        Ok(response)
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        run: &WorkflowRun,
        user_context: &UserContext,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let agent = self
            .registry
            .lookup(stage.agent)
            .await
            .ok_or(StageError::Unavailable)?;
        let payload = (stage.build)(run).ok_or(StageError::MissingInput)?;
        let message = AgentMessage::new(run.message_id(stage), ORCHESTRATOR, stage.agent, payload)
            .with_context(user_context.clone());

        let ctx = AgentContext::new(cancel.child_token());
        let deadline = self.settings.agent_timeout;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
            result = tokio::time::timeout(deadline, agent.process(&ctx, message)) => {
                result.map_err(|_| StageError::Timeout(deadline))??
            }
        };

        if !response.is_success() {
            let reason = response.error().unwrap_or("unspecified").to_string();
            return Err(StageError::Rejected(reason));
        }
        Ok(response)
    }

    async fn synthesize(
        &self,
        run: &WorkflowRun,
        cancel: &CancellationToken,
    ) -> Result<CelesteResponse, OrchestratorError> {
        let products = run
            .search_results()
            .map(|results| results.products.clone())
            .unwrap_or_default();

        let actions = run
            .recommendations()
            .map(|recs| recs.actions.clone())
            .filter(|actions| !actions.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTIONS.iter().map(|a| a.to_string()).collect());

        let message = self.coordinated_message(run, cancel).await?;

        Ok(CelesteResponse {
            message,
            products,
            actions,
            workflow_id: run.id.clone(),
            agent_path: run.agent_path.clone(),
            personalized: run.agent_path.len() > 1,
        })
    }

    async fn coordinated_message(
        &self,
        run: &WorkflowRun,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestratorError> {
        let prompt = coordination_prompt(&run.query, &run.agent_path);
        let deadline = self.settings.generation_timeout;

        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            result = tokio::time::timeout(deadline, self.generator.generate(&prompt)) => result,
        };

        let message = match generated {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!(workflow_id = %run.id, "Empty generated reply, using fallback message");
                FALLBACK_MESSAGE.to_string()
            }
            Ok(Err(e)) => {
                warn!(workflow_id = %run.id, error = %e, "Text generation failed, using fallback message");
                FALLBACK_MESSAGE.to_string()
            }
            Err(_) => {
                warn!(workflow_id = %run.id, "Text generation timed out, using fallback message");
                FALLBACK_MESSAGE.to_string()
            }
        };
        Ok(message)
    }

    /// Runs every agent's shutdown hook.
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}

fn describe_agent(agent: &str) -> &str {
    match agent {
        SEARCH_AGENT => "Search Agent: Found products and analyzed intent",
        INVENTORY_AGENT => "Inventory Agent: Checked stock levels and availability",
        RECOMMENDATION_AGENT => "Recommendation Agent: Generated personalized suggestions",
        other => other,
    }
}

fn coordination_prompt(query: &str, agent_path: &[String]) -> String {
    let results: Vec<String> = agent_path
        .iter()
        .map(|agent| format!("- {}", describe_agent(agent)))
        .collect();

    format!(
        "You are Céleste, coordinating multiple AI agents to provide intelligent shopping assistance.\n\n\
         Customer query: \"{}\"\n\n\
         Agent coordination results:\n{}\n\n\
         Provide a response that demonstrates this multi-agent coordination while being helpful and conversational.",
        query,
        results.join("\n")
    )
}
