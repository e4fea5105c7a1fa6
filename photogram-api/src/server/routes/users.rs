use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use axum::extract::{Query, State};
use axum_extra::{
    extract::WithRejection,
    routing::{RouterExt, TypedPath},
};
use photogram_common::model::{
    Id,
    post::Post,
    user::{Profile, User, UserMarker, Username},
};
use photogram_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(search_users)
        .typed_get(get_profile)
        .typed_put(set_username)
        .typed_get(get_username)
        .typed_get(get_stream)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    username: String,
}

async fn search_users(
    UsersPath(): UsersPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ServerError>,
) -> Result<Json<Vec<User>>> {
    let users = db
        .feed()
        .visible_search(user.user_id(), &query.username)
        .await?;

    Ok(Json(users))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ProfilePage {
    profile: Profile,
    posts: Vec<Post>,
}

async fn get_profile(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<ProfilePage>> {
    let profile = db.feed().profile_summary(id).await?;
    db.visibility().ensure_not_banned(user.user_id(), id).await?;
    let posts = db.feed().profile_stream(id).await?;

    Ok(Json(ProfilePage { profile, posts }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/username", rejection(ServerError))]
struct UsernamePath {
    id: Id<UserMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct SetUsernameRequest {
    username: String,
}

async fn set_username(
    UsernamePath { id }: UsernamePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<SetUsernameRequest>,
) -> Result<Json<User>> {
    user.ensure_acting_as(id)?;
    let renamed = db.users().rename(id, &request.username).await?;

    Ok(Json(renamed))
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct UsernameResponse {
    username: Username,
}

async fn get_username(
    UsernamePath { id }: UsernamePath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<UsernameResponse>> {
    let username = db.users().username(id).await?;

    Ok(Json(UsernameResponse { username }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/stream", rejection(ServerError))]
struct StreamPath {
    id: Id<UserMarker>,
}

async fn get_stream(
    StreamPath { id }: StreamPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Post>>> {
    user.ensure_acting_as(id)?;
    let stream = db.feed().home_stream(id).await?;

    Ok(Json(stream))
}
