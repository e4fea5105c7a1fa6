use crate::model::{
    Id,
    post::PostMarker,
    serialize_timestamp,
    user::UserMarker,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const COMMENT_MESSAGE_MAX_LEN: usize = 256;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub message: CommentMessage,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: UtcDateTime,
}

/// Comment text: 1 to 256 characters out of ASCII letters, digits, `.,!?;:'"`, and space, tab, newline,
/// form feed or carriage return.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentMessage(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The comment message is invalid: {0:?}")]
pub struct InvalidCommentMessageError(String);

impl CommentMessage {
    pub fn new(message: String) -> Result<Self, InvalidCommentMessageError> {
        let len = message.chars().count();
        if (1..=COMMENT_MESSAGE_MAX_LEN).contains(&len) && message.chars().all(is_message_char) {
            Ok(CommentMessage(message))
        } else {
            Err(InvalidCommentMessageError(message))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_message_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, ' ' | '\t' | '\n' | '\x0C' | '\r')
        || ".,!?;:'\"".contains(c)
}

impl<'de> Deserialize<'de> for CommentMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentMessage::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"CommentMessage"))
    }
}
