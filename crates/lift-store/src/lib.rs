pub mod database;
pub mod error;
pub mod lifts;
pub mod requests;
pub mod row_helpers;
pub mod schema;
pub mod sessions;
pub mod store;

pub use database::Database;
pub use error::StoreError;
pub use requests::RequestFilter;
pub use store::{DomainStore, SqliteStore};
