//! Store capabilities and the externally visible permissions mapped onto them.

use crate::errors::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A capability understood by the store's ACL policy language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Create,
    Read,
    Update,
    Patch,
    Delete,
    List,
    Scan,
    Sudo,
    Deny,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Scan => "scan",
            Self::Sudo => "sudo",
            Self::Deny => "deny",
        }
    }

    /// Capabilities added to every grant and hidden from callers
    pub fn internal() -> [Capability; 2] {
        [Self::List, Self::Scan]
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::List | Self::Scan)
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "patch" => Ok(Self::Patch),
            "delete" => Ok(Self::Delete),
            "list" => Ok(Self::List),
            "scan" => Ok(Self::Scan),
            "sudo" => Ok(Self::Sudo),
            "deny" => Ok(Self::Deny),
            other => Err(Error::validation_field(
                format!("Unknown capability: {}", other),
                "capabilities",
            )),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered, duplicate-free set of capabilities
pub type CapabilitySet = BTreeSet<Capability>;

/// Permission a caller may grant on a tenant's secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Create,
    Update,
    Delete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Read => Capability::Read,
            Self::Create => Capability::Create,
            Self::Update => Capability::Update,
            Self::Delete => Capability::Delete,
        }
    }

    /// Map a stored capability back to a caller-visible permission
    pub fn from_capability(capability: Capability) -> Option<Self> {
        match capability {
            Capability::Read => Some(Self::Read),
            Capability::Create => Some(Self::Create),
            Capability::Update => Some(Self::Update),
            Capability::Delete => Some(Self::Delete),
            _ => None,
        }
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::validation_field(
                format!("Unknown permission: {}", other),
                "permissions",
            )),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse caller-supplied permission strings.
///
/// Internal capabilities (`list`, `scan`) are accepted and dropped, since they
/// are always granted; anything else unknown is rejected.
pub fn parse_permissions<I, S>(raw: I) -> Result<BTreeSet<Permission>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut permissions = BTreeSet::new();
    for item in raw {
        let item = item.as_ref().trim().to_ascii_lowercase();
        if Capability::internal().iter().any(|c| c.as_str() == item) {
            continue;
        }
        permissions.insert(item.parse::<Permission>()?);
    }
    Ok(permissions)
}
