//! SQLite backend for the platform.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
