//! Follow and ban edges between users.
//!
//! Both relations have set semantics. Banning a user also drops that user's follow edge towards the
//! banner in the same transaction, so `ban(a, b)` and `follow(b, a)` never hold together.

use crate::{
    client::{DbError, Forbidden, Result, begin_write},
    record::{db_id, model_id},
    users::ensure_user,
    visibility::can_interact,
};
use photogram_common::model::{
    Id,
    user::{User, UserMarker},
};
use sqlx::{SqliteConnection, SqlitePool, query, query_scalar};
use tracing::{debug, info};

pub struct Relations<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Relations<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn follow(&self, follower: Id<UserMarker>, target: Id<UserMarker>) -> Result<User> {
        ensure_distinct(follower, target)?;
        let mut tx = begin_write(self.pool).await?;

        ensure_user(&mut tx, follower).await?;
        let target_user = ensure_user(&mut tx, target).await?;

        if !can_interact(&mut tx, follower, target).await? {
            return Err(Forbidden::BannedBy {
                owner: target,
                viewer: follower,
            }
            .into());
        }

        let inserted = query(
            "
            INSERT INTO follows (follower_id, followed_id)
            VALUES (?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(db_id(follower))
        .bind(db_id(target))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        if inserted > 0 {
            debug!(%follower, %target, "Followed user");
        }

        Ok(target_user)
    }

    /// Removes the follow edge if present. A ban on the follower does not prevent this.
    pub async fn unfollow(&self, follower: Id<UserMarker>, target: Id<UserMarker>) -> Result<()> {
        ensure_distinct(follower, target)?;
        let mut tx = begin_write(self.pool).await?;

        ensure_user(&mut tx, follower).await?;
        ensure_user(&mut tx, target).await?;
        remove_follow(&mut tx, follower, target).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Bans `target` on behalf of `banner`, dropping any follow of `target` towards `banner`.
    ///
    /// Banning an already banned user succeeds without changing anything.
    pub async fn ban(&self, banner: Id<UserMarker>, target: Id<UserMarker>) -> Result<User> {
        ensure_distinct(banner, target)?;
        let mut tx = begin_write(self.pool).await?;

        ensure_user(&mut tx, banner).await?;
        let target_user = ensure_user(&mut tx, target).await?;

        let inserted = query(
            "
            INSERT INTO bans (banner_id, banned_id)
            VALUES (?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(db_id(banner))
        .bind(db_id(target))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let unfollowed = remove_follow(&mut tx, target, banner).await?;

        tx.commit().await?;
        if inserted > 0 {
            info!(%banner, %target, unfollowed, "Banned user");
        }

        Ok(target_user)
    }

    /// Lifts a ban. Follow edges removed by the ban stay removed.
    pub async fn unban(&self, banner: Id<UserMarker>, target: Id<UserMarker>) -> Result<()> {
        ensure_distinct(banner, target)?;
        let mut tx = begin_write(self.pool).await?;

        ensure_user(&mut tx, banner).await?;
        ensure_user(&mut tx, target).await?;

        let removed = query("DELETE FROM bans WHERE banner_id = ? AND banned_id = ?")
            .bind(db_id(banner))
            .bind(db_id(target))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        if removed > 0 {
            info!(%banner, %target, "Unbanned user");
        }

        Ok(())
    }

    pub async fn is_following(&self, follower: Id<UserMarker>, target: Id<UserMarker>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        is_following(&mut conn, follower, target).await
    }

    pub async fn is_banned(&self, banner: Id<UserMarker>, target: Id<UserMarker>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        is_banned(&mut conn, banner, target).await
    }

    /// Ids of the users following `user_id`, ascending.
    pub async fn followers(&self, user_id: Id<UserMarker>) -> Result<Vec<Id<UserMarker>>> {
        let mut conn = self.pool.acquire().await?;
        followers(&mut conn, user_id).await
    }

    /// Ids of the users `user_id` follows, ascending.
    pub async fn followees(&self, user_id: Id<UserMarker>) -> Result<Vec<Id<UserMarker>>> {
        let mut conn = self.pool.acquire().await?;
        followees(&mut conn, user_id).await
    }
}

fn ensure_distinct(actor: Id<UserMarker>, target: Id<UserMarker>) -> Result<()> {
    if actor == target {
        Err(DbError::SelfReference(actor))
    } else {
        Ok(())
    }
}

async fn remove_follow(
    conn: &mut SqliteConnection,
    follower: Id<UserMarker>,
    target: Id<UserMarker>,
) -> Result<bool> {
    let removed = query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
        .bind(db_id(follower))
        .bind(db_id(target))
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(removed > 0)
}

pub(crate) async fn is_following(
    conn: &mut SqliteConnection,
    follower: Id<UserMarker>,
    target: Id<UserMarker>,
) -> Result<bool> {
    let count = query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followed_id = ?",
    )
    .bind(db_id(follower))
    .bind(db_id(target))
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

pub(crate) async fn is_banned(
    conn: &mut SqliteConnection,
    banner: Id<UserMarker>,
    target: Id<UserMarker>,
) -> Result<bool> {
    let count = query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bans WHERE banner_id = ? AND banned_id = ?",
    )
    .bind(db_id(banner))
    .bind(db_id(target))
    .fetch_one(&mut *conn)
    .await?;

    Ok(count > 0)
}

pub(crate) async fn followers(
    conn: &mut SqliteConnection,
    user_id: Id<UserMarker>,
) -> Result<Vec<Id<UserMarker>>> {
    let ids = query_scalar::<_, i64>(
        "SELECT follower_id FROM follows WHERE followed_id = ? ORDER BY follower_id",
    )
    .bind(db_id(user_id))
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids.into_iter().map(model_id).collect())
}

pub(crate) async fn followees(
    conn: &mut SqliteConnection,
    user_id: Id<UserMarker>,
) -> Result<Vec<Id<UserMarker>>> {
    let ids = query_scalar::<_, i64>(
        "SELECT followed_id FROM follows WHERE follower_id = ? ORDER BY followed_id",
    )
    .bind(db_id(user_id))
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids.into_iter().map(model_id).collect())
}

/// Ids of the users that have banned `user_id`.
pub(crate) async fn banned_by(
    conn: &mut SqliteConnection,
    user_id: Id<UserMarker>,
) -> Result<Vec<Id<UserMarker>>> {
    let ids = query_scalar::<_, i64>("SELECT banner_id FROM bans WHERE banned_id = ?")
        .bind(db_id(user_id))
        .fetch_all(&mut *conn)
        .await?;

    Ok(ids.into_iter().map(model_id).collect())
}
