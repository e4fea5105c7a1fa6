use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use photogram_common::model::{Id, user::UserMarker};
use photogram_db::client::DbClient;
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller's identity. The bearer token is the user's numeric id.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }

    /// Fails unless the caller is `requested`, for routes scoped to one user's own data.
    pub fn ensure_acting_as(self, requested: Id<UserMarker>) -> Result<(), ServerError> {
        if self.id == requested {
            Ok(())
        } else {
            Err(ServerError::NotActingUser {
                acting: self.id,
                requested,
            })
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let id: Id<UserMarker> = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse::<u64>()
            .map_err(|_| ServerError::InvalidToken)?
            .into();

        let db = Arc::<DbClient>::from_ref(state);
        if !db.users().exists(id).await? {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self { id })
    }
}
