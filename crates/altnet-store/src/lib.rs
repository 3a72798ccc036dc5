//! Storage for published pages, exploration trees, and the local browsing
//! history.

pub mod database;
pub mod error;
pub mod explorations;
pub mod memory;
pub mod records;
pub mod row_helpers;
pub mod schema;
pub mod sqlite;
pub mod visits;

pub use database::Database;
pub use error::DbError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
