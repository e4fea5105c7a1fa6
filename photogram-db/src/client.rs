use crate::{
    content::Content, feed::Feed, record::DbDataError, relations::Relations, users::Users,
    visibility::Visibility,
};
use photogram_common::model::{
    Id, ModelValidationError,
    comment::CommentMarker,
    post::PostMarker,
    user::{UserMarker, Username},
};
use sqlx::{
    Sqlite, SqlitePool, Transaction,
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tracing::info;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// How long a writer waits for another connection's write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ModelValidationError),
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] DbDataError),
    #[error("User with id {0} was not found.")]
    UserNotFound(Id<UserMarker>),
    #[error("User with username {0:?} was not found.")]
    UsernameNotFound(String),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentNotFound(Id<CommentMarker>),
    #[error("User {0} cannot follow or ban themselves.")]
    SelfReference(Id<UserMarker>),
    #[error(transparent)]
    Forbidden(#[from] Forbidden),
    #[error("Username {0} is already taken.")]
    UsernameTaken(Username),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Database migration failed: {0}")]
    Migration(#[from] MigrateError),
}

/// Why an otherwise well-formed operation was refused.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum Forbidden {
    #[error("User {owner} has banned user {viewer}.")]
    BannedBy {
        owner: Id<UserMarker>,
        viewer: Id<UserMarker>,
    },
    #[error("User {requester} does not own post {post}.")]
    NotPostOwner {
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
    },
    #[error("User {requester} is not the author of comment {comment}.")]
    NotCommentAuthor {
        comment: Id<CommentMarker>,
        requester: Id<UserMarker>,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    SelfReference,
    Forbidden,
    Conflict,
    Storage,
}

impl DbError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Validation(_) => ErrorKind::Validation,
            DbError::UserNotFound(_)
            | DbError::UsernameNotFound(_)
            | DbError::PostNotFound(_)
            | DbError::CommentNotFound(_) => ErrorKind::NotFound,
            DbError::SelfReference(_) => ErrorKind::SelfReference,
            DbError::Forbidden(_) => ErrorKind::Forbidden,
            DbError::UsernameTaken(_) => ErrorKind::Conflict,
            DbError::Data(_) | DbError::Sqlx(_) | DbError::Migration(_) => ErrorKind::Storage,
        }
    }
}

/// Owned handle to the store. Every engine component borrows its pool from here.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Self::from_pool(pool).await
    }

    /// A private in-memory database, kept alive on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrated");

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn users(&self) -> Users<'_> {
        Users::new(&self.pool)
    }

    #[must_use]
    pub fn relations(&self) -> Relations<'_> {
        Relations::new(&self.pool)
    }

    #[must_use]
    pub fn content(&self) -> Content<'_> {
        Content::new(&self.pool)
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility<'_> {
        Visibility::new(&self.pool)
    }

    #[must_use]
    pub fn feed(&self) -> Feed<'_> {
        Feed::new(&self.pool)
    }
}

/// Starts a transaction that holds the write lock from its first statement, so competing writers queue
/// on the busy timeout. Every mutator starts here.
pub(crate) async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, DbError, ErrorKind, Forbidden};

    #[test]
    fn error_kinds() {
        assert_eq!(DbError::UserNotFound(1.into()).kind(), ErrorKind::NotFound);
        assert_eq!(DbError::PostNotFound(1.into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            DbError::SelfReference(1.into()).kind(),
            ErrorKind::SelfReference
        );
        assert_eq!(
            DbError::from(Forbidden::BannedBy {
                owner: 1.into(),
                viewer: 2.into()
            })
            .kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            DbError::Sqlx(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Storage
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_on_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("photogram.db").display());
        let db = DbClient::connect(&url).await.unwrap();

        let mut users = Vec::new();
        for i in 0..40 {
            let (user, _) = db.users().create_or_get(&format!("user{i}")).await.unwrap();
            users.push(user.id);
        }

        let tasks: Vec<_> = users
            .chunks(2)
            .map(|pair| {
                let db = db.clone();
                let (follower, target) = (pair[0], pair[1]);
                tokio::spawn(async move {
                    db.relations().follow(follower, target).await?;
                    let post = db.content().create_post(target).await?;
                    db.content().like(post.id, follower).await?;
                    db.content().add_comment(follower, post.id, "hi").await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        for pair in users.chunks(2) {
            assert!(db.relations().is_following(pair[0], pair[1]).await.unwrap());
            assert_eq!(db.feed().home_stream(pair[0]).await.unwrap().len(), 1);
        }
    }
}
