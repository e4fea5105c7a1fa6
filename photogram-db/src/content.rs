//! Posts, their comments and their likes.

use crate::{
    client::{DbError, Forbidden, Result, begin_write},
    record::{CommentRecord, PostRecord, count, db_id, model_id, now_timestamp},
    users::ensure_user,
    visibility::can_interact,
};
use photogram_common::model::{
    Id, ModelValidationError,
    comment::{Comment, CommentMarker, CommentMessage},
    post::{PartialPost, Post, PostMarker},
    user::UserMarker,
};
use sqlx::{SqliteConnection, SqlitePool, query, query_as, query_scalar};
use tracing::{debug, info};

pub struct Content<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Content<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_post(&self, owner: Id<UserMarker>) -> Result<Post> {
        let mut tx = begin_write(self.pool).await?;
        ensure_user(&mut tx, owner).await?;

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts (owner_id, created_at)
            VALUES (?, ?)
            RETURNING id, owner_id, created_at
            ",
        )
        .bind(db_id(owner))
        .bind(now_timestamp())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let post = PartialPost::try_from(record)?;
        info!(post = %post.id, %owner, "Created post");
        Ok(post.hydrate(0, Vec::new()))
    }

    /// Checks that `post_id` exists and belongs to `requester` without changing anything.
    ///
    /// Lets the caller settle the post's image before [`Content::delete_post`] removes the record.
    pub async fn ensure_post_owner(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> Result<PartialPost> {
        let mut conn = self.pool.acquire().await?;
        ensure_post_owner(&mut conn, post_id, requester).await
    }

    /// Deletes a post along with all of its comments and likes, in one transaction.
    pub async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> Result<()> {
        let mut tx = begin_write(self.pool).await?;
        ensure_post_owner(&mut tx, post_id, requester).await?;

        let comments = query("DELETE FROM comments WHERE post_id = ?")
            .bind(db_id(post_id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let likes = query("DELETE FROM likes WHERE post_id = ?")
            .bind(db_id(post_id))
            .execute(&mut *tx)
            .await?
            .rows_affected();
        query("DELETE FROM posts WHERE id = ?")
            .bind(db_id(post_id))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(post = %post_id, comments, likes, "Deleted post");

        Ok(())
    }

    /// Adds a comment under a post. Fails when the post's owner has banned the author.
    pub async fn add_comment(
        &self,
        author: Id<UserMarker>,
        post_id: Id<PostMarker>,
        message: &str,
    ) -> Result<Comment> {
        let message = CommentMessage::new(message.to_owned()).map_err(ModelValidationError::from)?;
        let mut tx = begin_write(self.pool).await?;

        ensure_user(&mut tx, author).await?;
        let post = ensure_post(&mut tx, post_id).await?;
        if !can_interact(&mut tx, author, post.owner_id).await? {
            return Err(Forbidden::BannedBy {
                owner: post.owner_id,
                viewer: author,
            }
            .into());
        }

        let record = query_as::<_, CommentRecord>(
            "
            INSERT INTO comments (post_id, author_id, message, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, post_id, author_id, message, created_at
            ",
        )
        .bind(db_id(post_id))
        .bind(db_id(author))
        .bind(message.get())
        .bind(now_timestamp())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let comment = Comment::try_from(record)?;
        debug!(comment = %comment.id, post = %post_id, %author, "Added comment");
        Ok(comment)
    }

    pub async fn delete_comment(
        &self,
        comment_id: Id<CommentMarker>,
        requester: Id<UserMarker>,
    ) -> Result<()> {
        let mut tx = begin_write(self.pool).await?;

        let comment = fetch_comment(&mut tx, comment_id)
            .await?
            .ok_or(DbError::CommentNotFound(comment_id))?;
        if comment.author_id != requester {
            return Err(Forbidden::NotCommentAuthor {
                comment: comment_id,
                requester,
            }
            .into());
        }

        query("DELETE FROM comments WHERE id = ?")
            .bind(db_id(comment_id))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(comment = %comment_id, "Deleted comment");

        Ok(())
    }

    pub async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_comment(&mut conn, comment_id).await
    }

    /// Likes a post. Liking twice is the same as liking once, and users may like their own posts.
    pub async fn like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<()> {
        let mut tx = begin_write(self.pool).await?;
        ensure_user(&mut tx, user_id).await?;
        ensure_post(&mut tx, post_id).await?;

        query(
            "
            INSERT INTO likes (post_id, user_id)
            VALUES (?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(db_id(post_id))
        .bind(db_id(user_id))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn unlike(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<()> {
        let mut tx = begin_write(self.pool).await?;
        ensure_user(&mut tx, user_id).await?;
        ensure_post(&mut tx, post_id).await?;

        query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
            .bind(db_id(post_id))
            .bind(db_id(user_id))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn has_liked(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;

        let likes = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM likes WHERE post_id = ? AND user_id = ?",
        )
        .bind(db_id(post_id))
        .bind(db_id(user_id))
        .fetch_one(&mut *conn)
        .await?;

        Ok(likes > 0)
    }

    /// Ids of the users who liked `post_id`, ascending.
    pub async fn likers(&self, post_id: Id<PostMarker>) -> Result<Vec<Id<UserMarker>>> {
        let mut conn = self.pool.acquire().await?;
        ensure_post(&mut conn, post_id).await?;

        let ids = query_scalar::<_, i64>(
            "SELECT user_id FROM likes WHERE post_id = ? ORDER BY user_id",
        )
        .bind(db_id(post_id))
        .fetch_all(&mut *conn)
        .await?;

        Ok(ids.into_iter().map(model_id).collect())
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<PartialPost>> {
        let mut conn = self.pool.acquire().await?;
        fetch_post(&mut conn, post_id).await
    }

    /// The post with its live like count and its comments in the order they were written.
    pub async fn get(&self, post_id: Id<PostMarker>) -> Result<Post> {
        // Read in one transaction so a concurrent delete is seen entirely or not at all.
        let mut tx = self.pool.begin().await?;
        let post = ensure_post(&mut tx, post_id).await?;
        let post = hydrate(&mut tx, post).await?;
        tx.commit().await?;

        Ok(post)
    }
}

pub(crate) async fn fetch_post(
    conn: &mut SqliteConnection,
    post_id: Id<PostMarker>,
) -> Result<Option<PartialPost>> {
    let record = query_as::<_, PostRecord>(
        "
        SELECT
            posts.id,
            posts.owner_id,
            posts.created_at
        FROM
            posts
        WHERE
            posts.id = ?
        ",
    )
    .bind(db_id(post_id))
    .fetch_optional(&mut *conn)
    .await?;

    let post = record.map(PartialPost::try_from).transpose()?;
    Ok(post)
}

pub(crate) async fn ensure_post(
    conn: &mut SqliteConnection,
    post_id: Id<PostMarker>,
) -> Result<PartialPost> {
    fetch_post(conn, post_id)
        .await?
        .ok_or(DbError::PostNotFound(post_id))
}

async fn ensure_post_owner(
    conn: &mut SqliteConnection,
    post_id: Id<PostMarker>,
    requester: Id<UserMarker>,
) -> Result<PartialPost> {
    let post = ensure_post(conn, post_id).await?;
    if post.owner_id == requester {
        Ok(post)
    } else {
        Err(Forbidden::NotPostOwner {
            post: post_id,
            requester,
        }
        .into())
    }
}

async fn fetch_comment(
    conn: &mut SqliteConnection,
    comment_id: Id<CommentMarker>,
) -> Result<Option<Comment>> {
    let record = query_as::<_, CommentRecord>(
        "
        SELECT
            comments.id,
            comments.post_id,
            comments.author_id,
            comments.message,
            comments.created_at
        FROM
            comments
        WHERE
            comments.id = ?
        ",
    )
    .bind(db_id(comment_id))
    .fetch_optional(&mut *conn)
    .await?;

    let comment = record.map(Comment::try_from).transpose()?;
    Ok(comment)
}

async fn post_comments(
    conn: &mut SqliteConnection,
    post_id: Id<PostMarker>,
) -> Result<Vec<Comment>> {
    let records = query_as::<_, CommentRecord>(
        "
        SELECT
            comments.id,
            comments.post_id,
            comments.author_id,
            comments.message,
            comments.created_at
        FROM
            comments
        WHERE
            comments.post_id = ?
        ORDER BY
            comments.id
        ",
    )
    .bind(db_id(post_id))
    .fetch_all(&mut *conn)
    .await?;

    let comments = records
        .into_iter()
        .map(Comment::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

async fn like_count(conn: &mut SqliteConnection, post_id: Id<PostMarker>) -> Result<u64> {
    let likes = query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_id = ?")
        .bind(db_id(post_id))
        .fetch_one(&mut *conn)
        .await?;

    Ok(count(likes))
}

pub(crate) async fn hydrate(conn: &mut SqliteConnection, post: PartialPost) -> Result<Post> {
    let likes = like_count(conn, post.id).await?;
    let comments = post_comments(conn, post.id).await?;

    Ok(post.hydrate(likes, comments))
}

#[cfg(test)]
mod tests {
    use crate::{
        client::ErrorKind,
        test_util::{test_client, test_users},
    };
    use photogram_common::model::Id;
    use sqlx::query_scalar;

    #[tokio::test]
    async fn post_ids_are_monotonic() {
        let db = test_client().await;
        let [alice] = test_users(&db, ["alice"]).await;

        let first = db.content().create_post(alice).await.unwrap();
        let second = db.content().create_post(alice).await.unwrap();

        assert_eq!(first.id.get(), 1);
        assert_eq!(second.id.get(), 2);
        assert_eq!(first.owner_id, alice);
        assert_eq!(first.like_count, 0);
        assert!(first.comments.is_empty());
        assert!(first.created_at <= second.created_at);

        // Deleted ids are not handed out again.
        db.content().delete_post(second.id, alice).await.unwrap();
        let third = db.content().create_post(alice).await.unwrap();
        assert_eq!(third.id.get(), 3);
    }

    #[tokio::test]
    async fn create_post_for_unknown_owner() {
        let db = test_client().await;

        let err = db.content().create_post(Id::new(5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_post_cascades() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        let post = db.content().create_post(alice).await.unwrap();
        let other = db.content().create_post(alice).await.unwrap();

        db.content().add_comment(bob, post.id, "nice").await.unwrap();
        db.content().add_comment(alice, post.id, "thanks").await.unwrap();
        db.content().add_comment(bob, other.id, "also nice").await.unwrap();
        db.content().like(post.id, bob).await.unwrap();
        db.content().like(post.id, alice).await.unwrap();
        db.content().like(other.id, bob).await.unwrap();

        db.content().delete_post(post.id, alice).await.unwrap();

        let err = db.content().get(post.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let comments = query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post.id.get().cast_signed())
            .fetch_one(db.pool())
            .await
            .unwrap();
        let likes = query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_id = ?")
            .bind(post.id.get().cast_signed())
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(comments, 0);
        assert_eq!(likes, 0);

        let remaining = db.content().get(other.id).await.unwrap();
        assert_eq!(remaining.like_count, 1);
        assert_eq!(remaining.comments.len(), 1);
    }

    #[tokio::test]
    async fn only_owner_deletes_post() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        let post = db.content().create_post(alice).await.unwrap();
        db.content().like(post.id, bob).await.unwrap();

        let err = db.content().delete_post(post.id, bob).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = db.content().ensure_post_owner(post.id, bob).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = db.content().delete_post(Id::new(42), alice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert_eq!(db.content().get(post.id).await.unwrap().like_count, 1);
        assert_eq!(
            db.content().ensure_post_owner(post.id, alice).await.unwrap().id,
            post.id
        );
    }

    #[tokio::test]
    async fn comments_keep_arrival_order() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        let post = db.content().create_post(alice).await.unwrap();

        let first = db.content().add_comment(bob, post.id, "first").await.unwrap();
        let second = db.content().add_comment(alice, post.id, "second").await.unwrap();
        let third = db.content().add_comment(bob, post.id, "third").await.unwrap();

        assert_eq!(first.post_id, post.id);
        assert_eq!(first.author_id, bob);
        assert_eq!(first.message.get(), "first");

        let ids: Vec<_> = db
            .content()
            .get(post.id)
            .await
            .unwrap()
            .comments
            .into_iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(ids, [first.id, second.id, third.id]);
    }

    #[tokio::test]
    async fn comment_validation() {
        let db = test_client().await;
        let [alice] = test_users(&db, ["alice"]).await;
        let post = db.content().create_post(alice).await.unwrap();

        let too_long = "a".repeat(257);
        for message in ["", "<b>bold</b>", too_long.as_str()] {
            let err = db
                .content()
                .add_comment(alice, post.id, message)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let err = db
            .content()
            .add_comment(alice, Id::new(9), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(db.content().get(post.id).await.unwrap().comments.is_empty());
    }

    #[tokio::test]
    async fn ban_blocks_commenting() {
        let db = test_client().await;
        let [owner, commenter] = test_users(&db, ["owner", "commenter"]).await;
        let post = db.content().create_post(owner).await.unwrap();

        db.relations().ban(owner, commenter).await.unwrap();

        let err = db
            .content()
            .add_comment(commenter, post.id, "hi")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(db.content().get(post.id).await.unwrap().comments.is_empty());

        db.relations().unban(owner, commenter).await.unwrap();
        db.content().add_comment(commenter, post.id, "hi").await.unwrap();
    }

    #[tokio::test]
    async fn only_author_deletes_comment() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        let post = db.content().create_post(alice).await.unwrap();
        let comment = db.content().add_comment(bob, post.id, "mine").await.unwrap();

        // Owning the post is not enough.
        let err = db.content().delete_comment(comment.id, alice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        db.content().delete_comment(comment.id, bob).await.unwrap();
        assert!(db.content().fetch_comment(comment.id).await.unwrap().is_none());

        let err = db.content().delete_comment(comment.id, bob).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn likes_are_a_set() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        let post = db.content().create_post(alice).await.unwrap();

        db.content().like(post.id, bob).await.unwrap();
        db.content().like(post.id, bob).await.unwrap();
        db.content().like(post.id, alice).await.unwrap();

        assert!(db.content().has_liked(post.id, bob).await.unwrap());
        assert_eq!(db.content().get(post.id).await.unwrap().like_count, 2);
        assert_eq!(db.content().likers(post.id).await.unwrap(), [alice, bob]);

        db.content().unlike(post.id, bob).await.unwrap();
        db.content().unlike(post.id, bob).await.unwrap();

        assert!(!db.content().has_liked(post.id, bob).await.unwrap());
        assert_eq!(db.content().get(post.id).await.unwrap().like_count, 1);

        let err = db.content().like(Id::new(7), bob).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = db.content().like(post.id, Id::new(7)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
