//! Process-wide operating mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether a would-deny decision blocks the request or is only logged.
///
/// Chosen once at startup and passed explicitly to every component that
/// depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Observe,
    Enforce,
}

impl Default for OperatingMode {
    fn default() -> Self {
        OperatingMode::Enforce
    }
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Observe => "observe",
            OperatingMode::Enforce => "enforce",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown operating mode `{0}` (expected observe or enforce)")]
pub struct ParseModeError(String);

impl FromStr for OperatingMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "observe" | "dry_run" | "dry-run" => Ok(OperatingMode::Observe),
            "enforce" | "live" => Ok(OperatingMode::Enforce),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}
