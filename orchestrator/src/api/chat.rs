use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warp::{Rejection, Reply};

use crate::error::ApiError;
use crate::models::ChatRequest;
use crate::workflow::Orchestrator;

pub async fn handle_chat(
    request: ChatRequest,
    orchestrator: Arc<Orchestrator>,
) -> Result<impl Reply, Rejection> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(warp::reject::custom(ApiError::BadRequest(
            "query must not be empty".to_string(),
        )));
    }

    let user_id = request.user_id();
    info!(user_id = %user_id, "Processing chat query: {}", query);

    // Dropping this handler (client went away) cancels the in-flight workflow.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match orchestrator
        .process_user_request_cancellable(user_id, query, &cancel)
        .await
    {
        Ok(response) => Ok(warp::reply::json(&response)),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Orchestrator error");
            Err(warp::reject::custom(ApiError::from(e)))
        }
    }
}
