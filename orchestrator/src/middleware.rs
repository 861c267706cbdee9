/// Browser clients (the chat page) may be served from another origin.
pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Content-Type", "Accept", "Origin", "User-Agent"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .max_age(3600)
}
