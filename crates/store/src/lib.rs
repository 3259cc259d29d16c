//! Persistence for the sales workspace.
//!
//! [`SalesStore`] is implemented by [`InMemoryStore`] (tests, local runs) and
//! [`PostgresStore`]. Both commit order transitions through
//! [`SalesStore::apply_transition`], which checks and moves stock and changes
//! the order's state as one atomic unit.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{
    CLIENTS_PER_PAGE, ClientQuery, ORDERS_PER_PAGE, OrderQuery, PRODUCTS_PER_PAGE, ProductQuery,
};
pub use store::{SalesStore, SalesStoreExt};
