pub mod connection;
pub mod error;
pub mod kv;
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use error::{StorageError, StoreResult};
pub use store::{Backend, EntityKind, Store};
