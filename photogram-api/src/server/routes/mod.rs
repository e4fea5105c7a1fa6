use crate::server::ServerRouter;
use axum::{Router, extract::DefaultBodyLimit};

mod liveness;
mod posts;
mod relations;
mod session;
mod users;

/// Upper bound for request bodies, sized for photo uploads.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(liveness::routes())
        .merge(session::routes())
        .merge(users::routes())
        .merge(relations::routes())
        .merge(posts::routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
