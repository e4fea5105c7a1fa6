pub mod client;
pub mod content;
pub mod feed;
mod record;
pub mod relations;
pub mod users;
pub mod visibility;

#[cfg(test)]
mod test_util;

pub use record::DbDataError;
