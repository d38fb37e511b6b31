//! Server operating modes.
//!
//! The mode is decided outside this workspace and delivered to the
//! controller as a stream of updates. Only equality between modes matters;
//! there is no ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The cluster-wide operating mode of a server node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    /// Every tier serves traffic.
    Normal,
    /// Processing is suspended; which tiers stay up is a topology decision.
    Degraded,
}

impl Mode {
    /// Every known mode, in declaration order.
    pub const ALL: [Self; 2] = [Self::Normal, Self::Degraded];

    /// The canonical string form used on the wire and in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Degraded => "DEGRADED",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Ok(Self::Normal),
            "DEGRADED" => Ok(Self::Degraded),
            _ => Err(CoreError::InvalidMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}
