//! Opaque entity identities.
//!
//! A `VpId` is assigned once when an entity is created and never recomputed
//! from content. Identities end up inside dotted section names, so the
//! characters that delimit sections and keys are rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Characters that cannot appear in an identity.
const RESERVED_CHARS: &[char] = &['.', '[', ']', '=', '"', ';', '#'];

/// Errors that can occur when parsing an identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VpIdError {
    #[error("Identity must not be empty")]
    Empty,

    #[error("Identity contains reserved character {1:?}: {0}")]
    ReservedChar(String, char),
}

/// A stable, content-independent entity identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VpId(String);

impl VpId {
    /// Generate a fresh identity: 32 uppercase hex characters.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// Parse and validate an identity.
    pub fn parse(s: &str) -> Result<Self, VpIdError> {
        if s.is_empty() {
            return Err(VpIdError::Empty);
        }
        if let Some(c) = s
            .chars()
            .find(|c| c.is_whitespace() || RESERVED_CHARS.contains(c))
        {
            return Err(VpIdError::ReservedChar(s.to_string(), c));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VpId {
    type Err = VpIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for VpId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for VpId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VpId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
