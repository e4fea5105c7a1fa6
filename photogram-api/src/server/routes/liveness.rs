use crate::server::{ServerError, ServerRouter};
use axum::http::StatusCode;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(liveness)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/liveness", rejection(ServerError))]
struct LivenessPath();

async fn liveness(LivenessPath(): LivenessPath) -> StatusCode {
    StatusCode::OK
}
