use crate::model::{Id, comment::Comment, serialize_timestamp, user::UserMarker};
use serde::Serialize;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post together with its live like count and comments, oldest comment first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub owner_id: Id<UserMarker>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: UtcDateTime,
    pub like_count: u64,
    pub comments: Vec<Comment>,
}

/// The stored post row, without derived data.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PartialPost {
    pub id: Id<PostMarker>,
    pub owner_id: Id<UserMarker>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: UtcDateTime,
}

impl PartialPost {
    #[must_use]
    pub fn hydrate(self, like_count: u64, comments: Vec<Comment>) -> Post {
        Post {
            id: self.id,
            owner_id: self.owner_id,
            created_at: self.created_at,
            like_count,
            comments,
        }
    }
}
