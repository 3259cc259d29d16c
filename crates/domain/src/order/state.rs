//! Order state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// New ──────► Processed
///  │              │
///  └──────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    /// Order has been entered; no stock has moved.
    #[default]
    New,

    /// Stock has been decremented for every line.
    Processed,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderState {
    /// Returns true if the order can be processed in this state.
    pub fn can_process(&self) -> bool {
        matches!(self, OrderState::New)
    }

    /// Returns true if cancelling from this state changes the order.
    ///
    /// Cancelling an already cancelled order is a no-op, not an error.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::New | OrderState::Processed)
    }

    /// Returns true if cancelling from this state gives stock back.
    pub fn holds_stock(&self) -> bool {
        matches!(self, OrderState::Processed)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Cancelled)
    }

    /// Returns the state name as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::New => "new",
            OrderState::Processed => "processed",
            OrderState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order state: {0}")]
pub struct ParseOrderStateError(pub String);

impl std::str::FromStr for OrderState {
    type Err = ParseOrderStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderState::New),
            "processed" => Ok(OrderState::Processed),
            "cancelled" => Ok(OrderState::Cancelled),
            other => Err(ParseOrderStateError(other.to_string())),
        }
    }
}
