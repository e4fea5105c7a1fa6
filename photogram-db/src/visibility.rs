//! Whether one user may see or interact with another user's content.

use crate::{
    client::{Forbidden, Result},
    relations::is_banned,
};
use photogram_common::model::{Id, user::UserMarker};
use sqlx::{SqliteConnection, SqlitePool};

pub struct Visibility<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Visibility<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// `false` when `owner` has banned `viewer`.
    pub async fn can_interact(&self, viewer: Id<UserMarker>, owner: Id<UserMarker>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        can_interact(&mut conn, viewer, owner).await
    }

    pub async fn ensure_not_banned(
        &self,
        viewer: Id<UserMarker>,
        owner: Id<UserMarker>,
    ) -> Result<()> {
        if self.can_interact(viewer, owner).await? {
            Ok(())
        } else {
            Err(Forbidden::BannedBy { owner, viewer }.into())
        }
    }
}

pub(crate) async fn can_interact(
    conn: &mut SqliteConnection,
    viewer: Id<UserMarker>,
    owner: Id<UserMarker>,
) -> Result<bool> {
    Ok(!is_banned(conn, owner, viewer).await?)
}

#[cfg(test)]
mod tests {
    use crate::{
        client::ErrorKind,
        test_util::{test_client, test_users},
    };

    #[tokio::test]
    async fn ban_is_directional() {
        let db = test_client().await;
        let [owner, viewer] = test_users(&db, ["owner", "viewer"]).await;

        assert!(db.visibility().can_interact(viewer, owner).await.unwrap());
        db.visibility().ensure_not_banned(viewer, owner).await.unwrap();

        db.relations().ban(owner, viewer).await.unwrap();

        assert!(!db.visibility().can_interact(viewer, owner).await.unwrap());
        assert!(db.visibility().can_interact(owner, viewer).await.unwrap());
        assert!(db.visibility().can_interact(owner, owner).await.unwrap());

        let err = db
            .visibility()
            .ensure_not_banned(viewer, owner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
