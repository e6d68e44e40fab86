//! Opaque run-unique identifiers

use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Identifies one entry of the result store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey(Ulid);

impl ResultKey {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ResultKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one mutable reference cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefKey(Ulid);

impl RefKey {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RefKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RefKey {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}
