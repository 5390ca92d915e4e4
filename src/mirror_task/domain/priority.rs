//! Dispatch priority for mirror tasks.

use super::ParseMirrorPriorityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rank used to order competing tasks during a claim.
///
/// Declaration order matches the persisted ordinal so the derived `Ord`
/// agrees with `ORDER BY priority DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorPriority {
    /// Background refresh.
    Low,
    /// Default for scheduled syncs.
    Medium,
    /// User-visible syncs.
    High,
    /// Manually triggered syncs that jump the queue.
    Asap,
}

impl MirrorPriority {
    /// Returns the persisted ordinal.
    #[must_use]
    pub const fn value(self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Asap => 4,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Asap => "asap",
        }
    }
}

impl fmt::Display for MirrorPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for MirrorPriority {
    type Error = ParseMirrorPriorityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            4 => Ok(Self::Asap),
            other => Err(ParseMirrorPriorityError(other.to_string())),
        }
    }
}

impl TryFrom<&str> for MirrorPriority {
    type Error = ParseMirrorPriorityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "asap" => Ok(Self::Asap),
            _ => Err(ParseMirrorPriorityError(value.to_owned())),
        }
    }
}
