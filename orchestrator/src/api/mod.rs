use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Rejection, Reply};

use crate::workflow::Orchestrator;

mod agents;
mod chat;
mod dispatch;

pub fn routes(
    orchestrator: Arc<Orchestrator>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = warp::path("api").and(warp::path("v1"));

    let chat_route = api
        .and(warp::path("chat"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(chat::handle_chat);

    let dispatch_route = api
        .and(warp::path("dispatch"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(256 * 1024))
        .and(warp::body::json())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(dispatch::handle_dispatch);

    let agents_route = warp::path("agents")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(agents::handle_list_agents);

    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_orchestrator(orchestrator))
        .and_then(agents::handle_health);

    chat_route
        .or(dispatch_route)
        .or(agents_route)
        .or(health_route)
}

fn with_orchestrator(
    orchestrator: Arc<Orchestrator>,
) -> impl Filter<Extract = (Arc<Orchestrator>,), Error = Infallible> + Clone {
    warp::any().map(move || orchestrator.clone())
}
