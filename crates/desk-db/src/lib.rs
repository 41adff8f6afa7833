//! # Contract Desk persistence
//!
//! SQLite storage for the desk, built on `sqlx` with statements generated by
//! `sea-query`:
//!
//! - [`Database`]: the connection pool and schema creation
//! - [`QuerySet`] and [`Filter`]: record selection with batched related loading
//! - [`repo`]: inserts, updates and deletes
//! - [`log`]: the append-only change log, [`contenttypes`] it points through
//! - [`users`]: accounts, groups and permission grants
//! - [`settings`]: per-user JSON settings
//! - [`deletion`]: dependency collection before deletes
//! - [`storage`]: uploaded files

pub mod codec;
pub mod contenttypes;
pub mod deletion;
pub mod log;
pub mod pool;
pub mod query;
pub mod related;
pub mod repo;
pub mod schema;
pub mod settings;
pub mod storage;
pub mod users;

pub use deletion::Collector;
pub use log::{ActionFlag, LogEntry};
pub use pool::Database;
pub use query::{Filter, Lookup, QuerySet};
pub use sqlx::SqliteConnection;
pub use storage::{LocalStorage, Storage};
