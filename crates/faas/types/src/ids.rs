//! Resource identities
//!
//! Every object is addressed by its namespace-qualified name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Namespace-qualified name of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Error parsing a `namespace/name` string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource key {0:?}, expected namespace/name")]
pub struct KeyParseError(pub String);

impl FromStr for ResourceKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(KeyParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = ResourceKey::new("default", "hello");
        assert_eq!(key.to_string(), "default/hello");
    }

    #[test]
    fn test_key_parse() {
        let key: ResourceKey = "team-a/resize".parse().unwrap();
        assert_eq!(key, ResourceKey::new("team-a", "resize"));

        assert!("no-slash".parse::<ResourceKey>().is_err());
        assert!("/name".parse::<ResourceKey>().is_err());
        assert!("ns/".parse::<ResourceKey>().is_err());
        assert!("a/b/c".parse::<ResourceKey>().is_err());
    }
}
