//! Application services for the sales workspace.
//!
//! [`CatalogService`] manages clients and products. [`OrderService`] enters
//! orders and drives them through the stock ledger:
//! - `create_order` validates a draft and persists it in state `new`
//! - `process_order` decrements stock for every line, all or nothing
//! - `cancel_order` gives stock back if the order had been processed
//!
//! Both services are generic over [`store::SalesStore`].

pub mod access;
pub mod catalog;
pub mod error;
pub mod orders;

pub use access::{Capabilities, Capability, ParseCapabilityError};
pub use catalog::CatalogService;
pub use error::{Result, SalesError};
pub use orders::{OrderOutcome, OrderService};
