//! Order aggregate and its lifecycle.

mod aggregate;
mod state;

pub use aggregate::{LineItem, Order};
pub use state::{OrderState, ParseOrderStateError};
