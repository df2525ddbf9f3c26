//! Transactional relational store for the inventory engine.
//!
//! Every engine operation runs inside one [`Transaction`] that either commits
//! all of its writes or none of them. Two backends are provided: an in-memory
//! store for tests and local runs, and a PostgreSQL store.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::{
    CancellationQuery, CustomerQuery, DEFAULT_CANCELLATION_LIMIT, DEFAULT_CUSTOMER_LIMIT, Page,
};
pub use store::{
    CancellationRepository, CustomerRepository, InventoryRepository, LocationRepository,
    MovementRepository, OrderRepository, ProductRepository, Store, Transaction,
};
