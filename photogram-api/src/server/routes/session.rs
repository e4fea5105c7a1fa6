use crate::server::{
    Result, ServerError, ServerRouter,
    json::{Created, Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use photogram_common::model::user::User;
use photogram_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(login)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/session", rejection(ServerError))]
struct SessionPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct LoginRequest {
    username: String,
}

/// Logs in by username, registering the user on first use. The returned id doubles as the bearer token.
async fn login(
    SessionPath(): SessionPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<LoginRequest>,
) -> Result<Created<User>> {
    let (user, created) = db.users().create_or_get(&request.username).await?;

    Ok(Created {
        body: user,
        created,
    })
}
