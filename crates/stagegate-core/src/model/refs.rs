use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Opaque reference to a staff member in the directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberRef(String);

impl MemberRef {
    /// Placeholder attribution for stored checks that lost their `checkedBy`.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberRef {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Opaque reference to a department (workshop area) in the directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentRef(String);

impl DepartmentRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepartmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two kinds of owner record a tracked product can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Order,
    WarrantyClaim,
}

impl OwnerKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::WarrantyClaim => "warranty_claim",
        }
    }

    /// Store collection holding owner records of this kind.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Order => "orders",
            Self::WarrantyClaim => "warranty_claims",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerKind {
    type Err = ParseOwnerKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" | "orders" => Ok(Self::Order),
            "warranty_claim" | "warranty_claims" | "warranty" => Ok(Self::WarrantyClaim),
            _ => Err(ParseOwnerKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an [`OwnerKind`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid owner kind: '{0}'")]
pub struct ParseOwnerKindError(pub String);

/// The order or warranty claim a tracked product belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: OwnerKind,
    pub code: String,
}

impl OwnerRef {
    pub fn order(code: impl Into<String>) -> Self {
        Self {
            kind: OwnerKind::Order,
            code: code.into(),
        }
    }

    pub fn warranty_claim(code: impl Into<String>) -> Self {
        Self {
            kind: OwnerKind::WarrantyClaim,
            code: code.into(),
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.code)
    }
}
