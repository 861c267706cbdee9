use std::sync::Arc;

use tracing::{info, warn};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::error::ApiError;
use crate::models::AgentMessage;
use crate::workflow::Orchestrator;

pub async fn handle_dispatch(
    message: AgentMessage,
    orchestrator: Arc<Orchestrator>,
) -> Result<impl Reply, Rejection> {
    if !orchestrator.has_agent(&message.to_agent).await {
        warn!(to = %message.to_agent, message_id = %message.id, "Dispatch to unknown agent");
        return Err(warp::reject::custom(ApiError::NotFound(format!(
            "agent {}",
            message.to_agent
        ))));
    }

    info!(to = %message.to_agent, message_id = %message.id, kind = message.payload.kind(), "Dispatching message");

    let status = orchestrator.dispatch(message).await;
    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "status": status })),
        StatusCode::ACCEPTED,
    ))
}
