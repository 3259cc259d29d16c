//! Domain layer for the sales workspace.
//!
//! This crate holds the rules that do not depend on storage:
//! - Client and Product entities with field validation
//! - Order aggregate with line items, derived totals and its state machine
//! - Order entry validation (per-line and aggregate stock checks, line merging)
//! - Stock ledger planning: the stock movements a process or cancel implies,
//!   and the check-then-apply rule every store runs inside its atomic section

pub mod catalog;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod order;
pub mod value_objects;

pub use catalog::{Client, NewClient, NewProduct, Product, ProductUpdate};
pub use entry::{LineDraft, OrderDraft, validate_entry};
pub use error::{DomainError, FieldError, Shortfall, StockShortage, ValidationErrors};
pub use ledger::{StockDirection, StockMovement, Transition, apply_movements, check_stock};
pub use order::{LineItem, Order, OrderState, ParseOrderStateError};
pub use value_objects::{MAX_PRICE_CENTS, Money, ParseMoneyError};

pub use common::{ClientId, OrderId, ProductId};
