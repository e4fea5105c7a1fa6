//! Identity registry: user ids and their unique usernames.

use crate::{
    client::{DbError, Result, begin_write},
    record::{UserRecord, db_id, model_id},
};
use photogram_common::model::{
    Id, ModelValidationError,
    user::{User, UserMarker, Username},
};
use sqlx::{SqliteConnection, SqlitePool, query_as, query_scalar};
use tracing::info;

pub struct Users<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Users<'a> {
    pub(crate) fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the user named `username`, registering them first if needed.
    ///
    /// The second element is `true` only when the user was created by this call.
    pub async fn create_or_get(&self, username: &str) -> Result<(User, bool)> {
        let username = parse_username(username)?;
        let mut conn = self.pool.acquire().await?;

        if let Some(user) = fetch_user_by_username(&mut conn, &username).await? {
            return Ok((user, false));
        }

        // A concurrent login may have registered the name in the meantime.
        let inserted = query_scalar::<_, i64>(
            "
            INSERT INTO users (username)
            VALUES (?)
            ON CONFLICT (username) DO NOTHING
            RETURNING id
            ",
        )
        .bind(username.get())
        .fetch_optional(&mut *conn)
        .await?;

        match inserted {
            Some(id) => {
                let user = User {
                    id: model_id(id),
                    username,
                };
                info!(user = %user.id, username = %user.username, "Registered user");
                Ok((user, true))
            }
            None => {
                let user = fetch_user_by_username(&mut conn, &username)
                    .await?
                    .ok_or_else(|| DbError::UsernameNotFound(username.into_inner()))?;
                Ok((user, false))
            }
        }
    }

    pub async fn rename(&self, user_id: Id<UserMarker>, new_username: &str) -> Result<User> {
        let new_username = parse_username(new_username)?;
        let mut tx = begin_write(self.pool).await?;

        let current = ensure_user(&mut tx, user_id).await?;
        if current.username == new_username {
            return Ok(current);
        }

        if let Some(other) = fetch_user_by_username(&mut tx, &new_username).await?
            && other.id != user_id
        {
            return Err(DbError::UsernameTaken(new_username));
        }

        let updated = sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(new_username.get())
            .bind(db_id(user_id))
            .execute(&mut *tx)
            .await;

        match updated {
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(DbError::UsernameTaken(new_username));
            }
            result => {
                result?;
            }
        }

        tx.commit().await?;
        info!(user = %user_id, from = %current.username, to = %new_username, "Renamed user");

        Ok(User {
            id: user_id,
            username: new_username,
        })
    }

    pub async fn exists(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_user(&mut conn, user_id).await?.is_some())
    }

    pub async fn by_id(&self, user_id: Id<UserMarker>) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        ensure_user(&mut conn, user_id).await
    }

    pub async fn by_username(&self, username: &str) -> Result<User> {
        // A malformed name cannot belong to anyone.
        let Ok(parsed) = Username::new(username.to_owned()) else {
            return Err(DbError::UsernameNotFound(username.to_owned()));
        };

        let mut conn = self.pool.acquire().await?;
        fetch_user_by_username(&mut conn, &parsed)
            .await?
            .ok_or_else(|| DbError::UsernameNotFound(parsed.into_inner()))
    }

    pub async fn username(&self, user_id: Id<UserMarker>) -> Result<Username> {
        Ok(self.by_id(user_id).await?.username)
    }

    /// Users whose username starts with `prefix`, compared case-sensitively.
    ///
    /// Results come back in registration order, but callers should not rely on it.
    pub async fn search(&self, prefix: &str) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await?;
        search(&mut conn, prefix).await
    }
}

fn parse_username(username: &str) -> Result<Username> {
    Username::new(username.to_owned()).map_err(|err| ModelValidationError::from(err).into())
}

pub(crate) async fn fetch_user(
    conn: &mut SqliteConnection,
    user_id: Id<UserMarker>,
) -> Result<Option<User>> {
    let record = query_as::<_, UserRecord>(
        "
        SELECT
            users.id,
            users.username
        FROM
            users
        WHERE
            users.id = ?
        ",
    )
    .bind(db_id(user_id))
    .fetch_optional(&mut *conn)
    .await?;

    let user = record.map(User::try_from).transpose()?;
    Ok(user)
}

pub(crate) async fn ensure_user(
    conn: &mut SqliteConnection,
    user_id: Id<UserMarker>,
) -> Result<User> {
    fetch_user(conn, user_id)
        .await?
        .ok_or(DbError::UserNotFound(user_id))
}

async fn fetch_user_by_username(
    conn: &mut SqliteConnection,
    username: &Username,
) -> Result<Option<User>> {
    let record = query_as::<_, UserRecord>(
        "
        SELECT
            users.id,
            users.username
        FROM
            users
        WHERE
            users.username = ?
        ",
    )
    .bind(username.get())
    .fetch_optional(&mut *conn)
    .await?;

    let user = record.map(User::try_from).transpose()?;
    Ok(user)
}

pub(crate) async fn search(conn: &mut SqliteConnection, prefix: &str) -> Result<Vec<User>> {
    // instr is case-sensitive and treats the prefix literally, unlike LIKE.
    let records = query_as::<_, UserRecord>(
        "
        SELECT
            users.id,
            users.username
        FROM
            users
        WHERE
            instr(users.username, ?) = 1
        ORDER BY
            users.id
        ",
    )
    .bind(prefix)
    .fetch_all(&mut *conn)
    .await?;

    let users = records
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
