//! SQLite backend for the farm order engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::{SqliteDatabase, DEPOSIT_FAILED_REASON};
