use photogram_common::model::{
    Id,
    comment::{Comment, CommentMessage},
    post::PartialPost,
    user::{User, Username},
};
use sqlx::FromRow;
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Database had invalid entry")]
pub struct DbDataError;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub owner_id: i64,
    pub created_at: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub message: String,
    pub created_at: i64,
}

pub(crate) fn db_id<Marker>(id: Id<Marker>) -> i64 {
    id.get().cast_signed()
}

pub(crate) fn model_id<Marker>(id: i64) -> Id<Marker> {
    id.cast_unsigned().into()
}

pub(crate) fn count(value: i64) -> u64 {
    value.cast_unsigned()
}

/// Nanoseconds since the Unix epoch, the representation timestamps are stored in.
pub(crate) fn now_timestamp() -> i64 {
    i64::try_from(UtcDateTime::now().unix_timestamp_nanos()).unwrap_or(i64::MAX)
}

fn timestamp(nanos: i64) -> Result<UtcDateTime, DbDataError> {
    UtcDateTime::from_unix_timestamp_nanos(nanos.into()).map_err(|_| DbDataError)
}

impl TryFrom<UserRecord> for User {
    type Error = DbDataError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model_id(value.id),
            username: Username::new(value.username).map_err(|_| DbDataError)?,
        })
    }
}

impl TryFrom<PostRecord> for PartialPost {
    type Error = DbDataError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model_id(value.id),
            owner_id: model_id(value.owner_id),
            created_at: timestamp(value.created_at)?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = DbDataError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model_id(value.id),
            post_id: model_id(value.post_id),
            author_id: model_id(value.author_id),
            message: CommentMessage::new(value.message).map_err(|_| DbDataError)?,
            created_at: timestamp(value.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{PostRecord, UserRecord, now_timestamp};
    use photogram_common::model::{post::PartialPost, user::User};

    #[test]
    fn user_record_validates_username() {
        let valid = UserRecord {
            id: 7,
            username: "alice".to_owned(),
        };
        let invalid = UserRecord {
            id: 8,
            username: "a!".to_owned(),
        };

        let user = User::try_from(valid).unwrap();
        assert_eq!(user.id.get(), 7);
        assert_eq!(user.username.get(), "alice");
        assert!(User::try_from(invalid).is_err());
    }

    #[test]
    fn post_record_timestamp_round_trip() {
        let nanos = now_timestamp();
        let post = PartialPost::try_from(PostRecord {
            id: 1,
            owner_id: 2,
            created_at: nanos,
        })
        .unwrap();

        assert_eq!(post.created_at.unix_timestamp_nanos(), i128::from(nanos));
    }
}
