use std::time::Duration;

use thiserror::Error;
use warp::{reject::Reject, Rejection, Reply};

/// Errors raised by an agent's own lifecycle or processing.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to initialize agent {agent}: {reason}")]
    Initialization { agent: String, reason: String },

    #[error("Invalid payload for {agent}: {reason}")]
    Validation { agent: String, reason: String },

    #[error("Agent already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Text generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    pub fn validation(agent: &str, reason: impl Into<String>) -> Self {
        AgentError::Validation {
            agent: agent.to_string(),
            reason: reason.into(),
        }
    }

    pub fn initialization(agent: &str, reason: impl ToString) -> Self {
        AgentError::Initialization {
            agent: agent.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from the text-generation collaborator.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Text generation is not configured")]
    NotConfigured,

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Request timed out")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Delivery to {to_agent} timed out after {timeout:?}")]
    DeliveryTimeout { to_agent: String, timeout: Duration },

    #[error("Message bus is closed")]
    Closed,
}

/// Why a single pipeline stage did not produce output.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Agent call exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("Agent reported failure: {0}")]
    Rejected(String),

    #[error("Agent is not registered")]
    Unavailable,

    #[error("Required input from an earlier stage is missing")]
    MissingInput,

    #[error("Stage was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Stage {agent} failed: {source}")]
    StageFailure {
        agent: String,
        #[source]
        source: StageError,
    },

    #[error("Request was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestratorError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Reject for ApiError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(api_err) = err.find::<ApiError>() {
        let (code, message) = match api_err {
            ApiError::NotFound(_) => (404, "Resource not found"),
            ApiError::BadRequest(_) => (400, "Bad request"),
            ApiError::Orchestration(_) => (500, "Agent processing failed"),
        };

        let json = warp::reply::json(&serde_json::json!({
            "error": message,
            "details": api_err.to_string(),
        }));

        let status = warp::http::StatusCode::from_u16(code)
            .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
        Ok(warp::reply::with_status(json, status))
    } else {
        Err(err)
    }
}
