//! Shared types for the sales workspace.

mod page;
mod types;

pub use page::{Page, PageRequest};
pub use types::{ClientId, OrderId, ProductId};
