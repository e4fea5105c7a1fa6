//! Read-side views assembled from the social graph and the stored content.
//!
//! Streams are ordered newest first: by creation time descending, ties broken by the higher post id.

use crate::{
    client::Result,
    content::hydrate,
    record::{PostRecord, count, db_id},
    relations::{banned_by, followees, followers},
    users::{ensure_user, search},
};
use photogram_common::model::{
    Id,
    post::{PartialPost, Post},
    user::{Profile, User, UserMarker},
};
use sqlx::{SqliteConnection, SqlitePool, query_as, query_scalar};
use std::collections::HashSet;

pub struct Feed<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Feed<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Posts of everyone `user_id` follows, newest first.
    pub async fn home_stream(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.owner_id,
                posts.created_at
            FROM
                posts JOIN follows ON follows.followed_id = posts.owner_id
            WHERE
                follows.follower_id = ?
            ORDER BY
                posts.created_at DESC,
                posts.id DESC
            ",
        )
        .bind(db_id(user_id))
        .fetch_all(&mut *tx)
        .await?;

        let posts = hydrate_all(&mut tx, records).await?;
        tx.commit().await?;

        Ok(posts)
    }

    /// Posts owned by `user_id`, newest first.
    pub async fn profile_stream(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let mut tx = self.pool.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let records = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.owner_id,
                posts.created_at
            FROM
                posts
            WHERE
                posts.owner_id = ?
            ORDER BY
                posts.created_at DESC,
                posts.id DESC
            ",
        )
        .bind(db_id(user_id))
        .fetch_all(&mut *tx)
        .await?;

        let posts = hydrate_all(&mut tx, records).await?;
        tx.commit().await?;

        Ok(posts)
    }

    pub async fn profile_summary(&self, user_id: Id<UserMarker>) -> Result<Profile> {
        let mut tx = self.pool.begin().await?;
        let user = ensure_user(&mut tx, user_id).await?;

        let post_count = query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE owner_id = ?")
            .bind(db_id(user_id))
            .fetch_one(&mut *tx)
            .await?;
        let follower_count = followers(&mut tx, user_id).await?.len();
        let following_count = followees(&mut tx, user_id).await?.len();

        tx.commit().await?;

        Ok(Profile {
            user,
            post_count: count(post_count),
            follower_count: follower_count as u64,
            following_count: following_count as u64,
        })
    }

    /// Username prefix search as seen by `viewer`: users who banned the viewer are left out.
    pub async fn visible_search(&self, viewer: Id<UserMarker>, prefix: &str) -> Result<Vec<User>> {
        let mut tx = self.pool.begin().await?;

        let found = search(&mut tx, prefix).await?;
        let hidden: HashSet<_> = banned_by(&mut tx, viewer).await?.into_iter().collect();

        tx.commit().await?;

        Ok(found
            .into_iter()
            .filter(|user| !hidden.contains(&user.id))
            .collect())
    }
}

async fn hydrate_all(conn: &mut SqliteConnection, records: Vec<PostRecord>) -> Result<Vec<Post>> {
    let mut posts = Vec::with_capacity(records.len());
    for record in records {
        let post = PartialPost::try_from(record)?;
        posts.push(hydrate(conn, post).await?);
    }

    Ok(posts)
}

#[cfg(test)]
mod tests {
    use crate::{
        client::ErrorKind,
        test_util::{test_client, test_users},
    };
    use photogram_common::model::Id;

    #[tokio::test]
    async fn home_stream_is_newest_first() {
        let db = test_client().await;
        let [reader, bob, carol, dave] = test_users(&db, ["reader", "bob", "carol", "dave"]).await;
        db.relations().follow(reader, bob).await.unwrap();
        db.relations().follow(reader, carol).await.unwrap();

        let mut expected = Vec::new();
        for owner in [bob, carol, bob, carol, bob] {
            expected.push(db.content().create_post(owner).await.unwrap().id);
        }
        // Posts from users the reader does not follow stay out.
        db.content().create_post(dave).await.unwrap();
        db.content().create_post(reader).await.unwrap();
        expected.reverse();

        let stream: Vec<_> = db
            .feed()
            .home_stream(reader)
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(stream, expected);
    }

    #[tokio::test]
    async fn home_stream_follows_the_graph() {
        let db = test_client().await;
        let [reader, bob] = test_users(&db, ["reader", "bob"]).await;
        db.content().create_post(bob).await.unwrap();

        assert!(db.feed().home_stream(reader).await.unwrap().is_empty());

        db.relations().follow(reader, bob).await.unwrap();
        assert_eq!(db.feed().home_stream(reader).await.unwrap().len(), 1);

        db.relations().ban(bob, reader).await.unwrap();
        assert!(db.feed().home_stream(reader).await.unwrap().is_empty());

        let err = db.feed().home_stream(Id::new(77)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn streams_are_hydrated() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        db.relations().follow(alice, bob).await.unwrap();
        let post = db.content().create_post(bob).await.unwrap();
        db.content().like(post.id, alice).await.unwrap();
        db.content().add_comment(alice, post.id, "great").await.unwrap();

        let home = db.feed().home_stream(alice).await.unwrap();
        let profile = db.feed().profile_stream(bob).await.unwrap();

        assert_eq!(home, profile);
        assert_eq!(home[0].like_count, 1);
        assert_eq!(home[0].comments.len(), 1);
        assert_eq!(home[0].comments[0].message.get(), "great");
    }

    #[tokio::test]
    async fn profile_stream_and_summary() {
        let db = test_client().await;
        let [alice, bob, carol] = test_users(&db, ["alice", "bob", "carol"]).await;
        let first = db.content().create_post(alice).await.unwrap();
        let second = db.content().create_post(alice).await.unwrap();
        db.content().create_post(bob).await.unwrap();
        db.relations().follow(bob, alice).await.unwrap();
        db.relations().follow(carol, alice).await.unwrap();
        db.relations().follow(alice, carol).await.unwrap();

        let stream: Vec<_> = db
            .feed()
            .profile_stream(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();
        assert_eq!(stream, [second.id, first.id]);

        let profile = db.feed().profile_summary(alice).await.unwrap();
        assert_eq!(profile.user.id, alice);
        assert_eq!(profile.user.username.get(), "alice");
        assert_eq!(profile.post_count, 2);
        assert_eq!(profile.follower_count, 2);
        assert_eq!(profile.following_count, 1);

        let err = db.feed().profile_summary(Id::new(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = db.feed().profile_stream(Id::new(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn visible_search_hides_banners() {
        let db = test_client().await;
        let [viewer, anna, andy, annie] = test_users(&db, ["viewer", "anna", "andy", "annie"]).await;
        db.relations().ban(andy, viewer).await.unwrap();
        // Bans the viewer issued do not hide anyone.
        db.relations().ban(viewer, annie).await.unwrap();

        let found: Vec<_> = db
            .feed()
            .visible_search(viewer, "an")
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.id)
            .collect();
        assert_eq!(found, [anna, annie]);

        let found = db.feed().visible_search(anna, "an").await.unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn follow_ban_comment_scenario() {
        let db = test_client().await;
        let [alice, bob] = test_users(&db, ["alice", "bob"]).await;
        assert_eq!((alice.get(), bob.get()), (1, 2));

        db.relations().follow(alice, bob).await.unwrap();
        let post = db.content().create_post(bob).await.unwrap();
        assert_eq!(post.id.get(), 1);

        let stream = db.feed().home_stream(alice).await.unwrap();
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].id, post.id);
        assert_eq!(stream[0].owner_id, bob);
        assert_eq!(stream[0].like_count, 0);
        assert!(stream[0].comments.is_empty());

        db.relations().ban(bob, alice).await.unwrap();
        assert!(!db.relations().is_following(alice, bob).await.unwrap());
        assert!(db.relations().is_banned(bob, alice).await.unwrap());

        let err = db
            .content()
            .add_comment(alice, post.id, "nice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
