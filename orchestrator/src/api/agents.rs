use std::sync::Arc;

use warp::{Rejection, Reply};

use crate::models::{AgentListResponse, HealthResponse};
use crate::workflow::Orchestrator;

pub async fn handle_list_agents(orchestrator: Arc<Orchestrator>) -> Result<impl Reply, Rejection> {
    let agents = orchestrator.list_agents().await;
    Ok(warp::reply::json(&AgentListResponse {
        count: agents.len(),
        agents,
    }))
}

pub async fn handle_health(orchestrator: Arc<Orchestrator>) -> Result<impl Reply, Rejection> {
    let agents = orchestrator.list_agents().await;
    Ok(warp::reply::json(&HealthResponse {
        status: "healthy",
        agent_count: agents.len(),
        agents,
    }))
}
