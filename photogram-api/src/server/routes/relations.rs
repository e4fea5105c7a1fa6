use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use photogram_common::model::{
    Id,
    user::{User, UserMarker},
};
use photogram_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_put(follow)
        .typed_delete(unfollow)
        .typed_get(get_following)
        .typed_put(ban)
        .typed_delete(unban)
        .typed_get(get_banned)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/following/{target}", rejection(ServerError))]
struct FollowingPath {
    id: Id<UserMarker>,
    target: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FollowStatus {
    following: bool,
}

async fn follow(
    FollowingPath { id, target }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Created<User>> {
    user.ensure_acting_as(id)?;
    let followed = db.relations().follow(id, target).await?;

    Ok(Created::new(followed))
}

async fn unfollow(
    FollowingPath { id, target }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    user.ensure_acting_as(id)?;
    db.relations().unfollow(id, target).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_following(
    FollowingPath { id, target }: FollowingPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<FollowStatus>> {
    user.ensure_acting_as(id)?;
    db.users().by_id(target).await?;
    let following = db.relations().is_following(id, target).await?;

    Ok(Json(FollowStatus { following }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/banned/{target}", rejection(ServerError))]
struct BannedPath {
    id: Id<UserMarker>,
    target: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct BanStatus {
    banned: bool,
}

async fn ban(
    BannedPath { id, target }: BannedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Created<User>> {
    user.ensure_acting_as(id)?;
    let banned = db.relations().ban(id, target).await?;

    Ok(Created::new(banned))
}

async fn unban(
    BannedPath { id, target }: BannedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    user.ensure_acting_as(id)?;
    db.relations().unban(id, target).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_banned(
    BannedPath { id, target }: BannedPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<BanStatus>> {
    user.ensure_acting_as(id)?;
    db.users().by_id(target).await?;
    let banned = db.relations().is_banned(id, target).await?;

    Ok(Json(BanStatus { banned }))
}
