//! Ledger-native status and priority codes.
//!
//! The ledger stores [`TaskStatus`] and [`Priority`] as small integers.
//! This module is the only place that knows the numbering. Decoding a code
//! outside the known range yields [`UnknownCode`] instead of a default, so a
//! ledger upgrade that introduces new codes surfaces as a typed failure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which enumeration a ledger code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeDomain {
    /// Task status codes (`0..=3`).
    Status,
    /// Task priority codes (`0..=2`).
    Priority,
}

impl fmt::Display for CodeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Priority => write!(f, "priority"),
        }
    }
}

/// The ledger returned a code this client does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown {domain} code {code}")]
pub struct UnknownCode {
    /// Enumeration the code was decoded for.
    pub domain: CodeDomain,
    /// The raw code.
    pub code: u8,
}

/// A name that did not match any variant when parsing from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {domain} name: {name}")]
pub struct UnknownName {
    /// Enumeration the name was parsed for.
    pub domain: CodeDomain,
    /// The rejected input.
    pub name: String,
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Hidden from the active list but kept on the ledger.
    Archived,
}

impl TaskStatus {
    /// Every status, in code order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Archived,
    ];

    /// Ledger code for this status.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
            Self::Archived => 3,
        }
    }

    /// Decodes a ledger status code.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCode`] for any code outside `0..=3`.
    pub const fn from_code(code: u8) -> Result<Self, UnknownCode> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Completed),
            3 => Ok(Self::Archived),
            _ => Err(UnknownCode {
                domain: CodeDomain::Status,
                code,
            }),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.to_code()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|status| status.name() == wanted)
            .ok_or_else(|| UnknownName {
                domain: CodeDomain::Status,
                name: s.to_string(),
            })
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal.
    Medium,
    /// Urgent.
    High,
}

impl Priority {
    /// Every priority, in code order.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Ledger code for this priority.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Decodes a ledger priority code.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCode`] for any code outside `0..=2`.
    pub const fn from_code(code: u8) -> Result<Self, UnknownCode> {
        match code {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            _ => Err(UnknownCode {
                domain: CodeDomain::Priority,
                code,
            }),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.to_code()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Priority {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|priority| priority.name() == wanted)
            .ok_or_else(|| UnknownName {
                domain: CodeDomain::Priority,
                name: s.to_string(),
            })
    }
}

/// Uppercases and maps `-`/space to `_` so `in-progress` parses.
fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}
