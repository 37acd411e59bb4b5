//! Three-component semantic versions.
//!
//! Only `major.minor.patch` is accepted: no pre-release tags, no build
//! metadata, no leading zeros. Parsing is strict so that a parsed version
//! always renders back to the exact input string.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// A parsed `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl Version {
    /// Create a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string.
    pub fn parse(s: &str) -> RegistryResult<Self> {
        let invalid = || RegistryError::InvalidVersionFormat(s.to_string());

        let mut parts = s.split('.');
        let mut next = || -> RegistryResult<u64> {
            let part = parts.next().ok_or_else(invalid)?;
            parse_component(part).ok_or_else(invalid)
        };

        let major = next()?;
        let minor = next()?;
        let patch = next()?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }
}

fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Parse a version string.
pub fn parse_version(s: &str) -> RegistryResult<Version> {
    Version::parse(s)
}

/// Compare two versions component-wise.
pub fn compare_versions(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let v = parse_version("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_round_trips() {
        for s in ["0.0.0", "1.0.0", "10.20.30", "2.0.17", "18446744073709551615.0.1"] {
            assert_eq!(parse_version(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for s in [
            "", "1", "1.2", "1.2.3.4", "1..3", "v1.2.3", "1.2.x", "-1.2.3", "+1.2.3", " 1.2.3",
            "1.2.3 ", "01.2.3", "1.2.3-beta", "99999999999999999999.0.0",
        ] {
            let err = parse_version(s).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidVersionFormat(ref input) if input == s),
                "expected InvalidVersionFormat for {:?}",
                s
            );
        }
    }

    #[test]
    fn test_compare_is_component_wise() {
        let a = parse_version("1.10.0").unwrap();
        let b = parse_version("1.9.9").unwrap();
        assert_eq!(compare_versions(&a, &b), Ordering::Greater);
        assert_eq!(compare_versions(&b, &a), Ordering::Less);
        assert_eq!(compare_versions(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_serde_as_string() {
        let v: Version = serde_json::from_str("\"3.1.4\"").unwrap();
        assert_eq!(v, Version::new(3, 1, 4));
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3.1.4\"");
        assert!(serde_json::from_str::<Version>("\"3.1\"").is_err());
    }
}
