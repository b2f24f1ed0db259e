//! PostgreSQL connection pooling for the template store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
