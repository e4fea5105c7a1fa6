pub mod comment;
pub mod post;
pub mod user;

use crate::model::{comment::InvalidCommentMessageError, user::InvalidUsernameError};
use derive_where::derive_where;
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, UtcOffset, format_description::well_known::Rfc3339};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Username(#[from] InvalidUsernameError),
    #[error(transparent)]
    CommentMessage(#[from] InvalidCommentMessageError),
}

/// Numeric identity of a stored entity, tagged with the kind of entity it names.
///
/// Ids are handed out by the store, increase monotonically and are never reused.
#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Id<Marker>(u64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(value)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

/// Serializes a timestamp as an RFC 3339 string in UTC.
pub(crate) fn serialize_timestamp<S>(value: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = value
        .to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;

    serializer.serialize_str(&formatted)
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, user::UserMarker};

    #[test]
    fn id_serializes_as_number() {
        let id = Id::<UserMarker>::new(42);

        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<UserMarker>>("42").unwrap(), id);
        assert_eq!(id.to_string(), "42");
        assert_eq!(u64::from(id), 42);
    }

    #[test]
    fn ids_order_by_value() {
        let older = Id::<UserMarker>::new(3);
        let newer = Id::<UserMarker>::new(10);

        assert!(older < newer);
    }
}
