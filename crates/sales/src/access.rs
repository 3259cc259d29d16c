//! Capabilities checked by restricted operations.
//!
//! Authentication happens elsewhere; the services only see which
//! capabilities the caller holds.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, SalesError};

/// A permission a caller can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read access to client records.
    ViewClient,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewClient => "view_client",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown capability: {0}")]
pub struct ParseCapabilityError(pub String);

impl FromStr for Capability {
    type Err = ParseCapabilityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "view_client" => Ok(Capability::ViewClient),
            other => Err(ParseCapabilityError(other.to_string())),
        }
    }
}

/// The set of capabilities held by the caller of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    /// A caller with no capabilities.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    /// Parses a comma-separated list. Unknown names are skipped.
    pub fn parse_list(list: &str) -> Self {
        let set = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(|s| match s.parse() {
                Ok(capability) => Some(capability),
                Err(err) => {
                    tracing::debug!(%err, "ignoring capability");
                    None
                }
            })
            .collect();
        Self(set)
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Fails with `Permission` unless the capability is held.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(SalesError::Permission(capability))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_skips_unknown_and_blank() {
        let caps = Capabilities::parse_list(" view_client , ,delete_everything");
        assert!(caps.has(Capability::ViewClient));
        assert_eq!(caps, Capabilities::none().with(Capability::ViewClient));
    }

    #[test]
    fn require_reports_missing_capability() {
        let result = Capabilities::none().require(Capability::ViewClient);
        assert!(matches!(result, Err(SalesError::Permission(Capability::ViewClient))));
        assert!(
            Capabilities::none()
                .with(Capability::ViewClient)
                .require(Capability::ViewClient)
                .is_ok()
        );
    }
}
