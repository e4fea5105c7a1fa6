use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    images::{ImageFormat, ImageStore},
    json::{Created, Json},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use axum_extra::routing::{RouterExt, TypedPath};
use photogram_common::model::{
    Id,
    comment::{Comment, CommentMarker},
    post::{Post, PostMarker},
    user::UserMarker,
};
use photogram_db::client::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(upload_post)
        .typed_delete(delete_post)
        .typed_get(get_post)
        .typed_get(get_image)
        .typed_get(get_likers)
        .typed_put(like)
        .typed_delete(unlike)
        .typed_get(get_like)
        .typed_post(add_comment)
        .typed_delete(delete_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct UploadPostPath {
    id: Id<UserMarker>,
}

/// Creates a post from a raw PNG or JPEG request body.
async fn upload_post(
    UploadPostPath { id }: UploadPostPath,
    State(db): State<Arc<DbClient>>,
    State(images): State<Arc<ImageStore>>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Result<Created<Post>> {
    user.ensure_acting_as(id)?;
    let format = ImageFormat::sniff(&body).ok_or(ServerError::UnsupportedImage)?;

    let post = db.content().create_post(id).await?;
    if let Err(err) = images.save(post.id, format, &body).await {
        // The record is useless without its image.
        warn!(post = %post.id, error = %err, "Image write failed, dropping post");
        if let Err(remove_err) = images.remove(post.id).await {
            error!(post = %post.id, error = %remove_err, "Could not clean up partial image");
        }
        if let Err(delete_err) = db.content().delete_post(post.id, id).await {
            error!(post = %post.id, error = %delete_err, "Could not drop post without image");
        }
        return Err(err.into());
    }

    Ok(Created::new(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts/{post_id}", rejection(ServerError))]
struct UserPostPath {
    id: Id<UserMarker>,
    post_id: Id<PostMarker>,
}

async fn delete_post(
    UserPostPath { id, post_id }: UserPostPath,
    State(db): State<Arc<DbClient>>,
    State(images): State<Arc<ImageStore>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    user.ensure_acting_as(id)?;
    db.content().ensure_post_owner(post_id, id).await?;
    images.remove(post_id).await?;
    db.content().delete_post(post_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}", rejection(ServerError))]
struct PostPath {
    post_id: Id<PostMarker>,
}

async fn get_post(
    PostPath { post_id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Post>> {
    let post = db.content().get(post_id).await?;
    db.visibility()
        .ensure_not_banned(user.user_id(), post.owner_id)
        .await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/image", rejection(ServerError))]
struct ImagePath {
    post_id: Id<PostMarker>,
}

async fn get_image(
    ImagePath { post_id }: ImagePath,
    State(db): State<Arc<DbClient>>,
    State(images): State<Arc<ImageStore>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse> {
    let post = db
        .content()
        .fetch_post(post_id)
        .await?
        .ok_or(DbError::PostNotFound(post_id))?;
    db.visibility()
        .ensure_not_banned(user.user_id(), post.owner_id)
        .await?;

    let (format, bytes) = images
        .load(post_id)
        .await?
        .ok_or(ServerError::ImageNotFound(post_id))?;

    Ok(([(CONTENT_TYPE, format.mime_type())], bytes))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/likes", rejection(ServerError))]
struct LikesPath {
    post_id: Id<PostMarker>,
}

async fn get_likers(
    LikesPath { post_id }: LikesPath,
    State(db): State<Arc<DbClient>>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Id<UserMarker>>>> {
    let likers = db.content().likers(post_id).await?;

    Ok(Json(likers))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/likes/{id}", rejection(ServerError))]
struct LikePath {
    post_id: Id<PostMarker>,
    id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LikeStatus {
    liked: bool,
}

async fn like(
    LikePath { post_id, id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    user.ensure_acting_as(id)?;
    db.content().like(post_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn unlike(
    LikePath { post_id, id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    user.ensure_acting_as(id)?;
    db.content().unlike(post_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_like(
    LikePath { post_id, id }: LikePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeStatus>> {
    user.ensure_acting_as(id)?;
    if db.content().fetch_post(post_id).await?.is_none() {
        return Err(DbError::PostNotFound(post_id).into());
    }
    let liked = db.content().has_liked(post_id, id).await?;

    Ok(Json(LikeStatus { liked }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comments", rejection(ServerError))]
struct CommentsPath {
    post_id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct CommentRequest {
    message: String,
}

async fn add_comment(
    CommentsPath { post_id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(request): Json<CommentRequest>,
) -> Result<Created<Comment>> {
    let comment = db
        .content()
        .add_comment(user.user_id(), post_id, &request.message)
        .await?;

    Ok(Created::new(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comments/{comment_id}", rejection(ServerError))]
struct CommentPath {
    post_id: Id<PostMarker>,
    comment_id: Id<CommentMarker>,
}

async fn delete_comment(
    CommentPath {
        post_id,
        comment_id,
    }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    // A comment is only addressable under the post it belongs to.
    match db.content().fetch_comment(comment_id).await? {
        Some(comment) if comment.post_id == post_id => {}
        _ => return Err(DbError::CommentNotFound(comment_id).into()),
    }
    db.content()
        .delete_comment(comment_id, user.user_id())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
