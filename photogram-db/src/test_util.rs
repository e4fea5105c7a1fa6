use crate::client::DbClient;
use photogram_common::model::{Id, user::UserMarker};

pub(crate) async fn test_client() -> DbClient {
    DbClient::in_memory().await.unwrap()
}

/// Registers the given usernames in order and returns their ids.
pub(crate) async fn test_users<const N: usize>(
    db: &DbClient,
    names: [&str; N],
) -> [Id<UserMarker>; N] {
    let mut ids = Vec::with_capacity(N);
    for name in names {
        let (user, _) = db.users().create_or_get(name).await.unwrap();
        ids.push(user.id);
    }

    ids.try_into().unwrap()
}
