use crate::error::{ModError, ModResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const KEY_SEPARATOR: char = '.';
const DEPENDENCY_SEPARATOR: char = '-';

/// Identity of a mod in local state: `namespace.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModKey {
    namespace: String,
    name: String,
}

impl ModKey {
    pub fn new(namespace: &str, name: &str) -> ModResult<Self> {
        let namespace = namespace.trim();
        let name = name.trim();
        let valid = |segment: &str| !segment.is_empty() && !segment.contains(KEY_SEPARATOR);
        if !valid(namespace) || !valid(name) {
            return Err(ModError::InvalidIdentifier(format!("{namespace}{KEY_SEPARATOR}{name}")));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Parses the state-file form. Splits on the first `.`.
    pub fn parse(raw: &str) -> ModResult<Self> {
        let (namespace, name) = raw
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| ModError::InvalidIdentifier(raw.to_string()))?;
        Self::new(namespace, name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ModKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.namespace, self.name)
    }
}

impl Serialize for ModKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ModKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Registry dependency string: `namespace-name-version`.
///
/// The namespace ends at the first `-` and the version starts after the last
/// one, so hyphens inside the name survive. A namespace that itself contains
/// `-` cannot be told apart and parses wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyId {
    raw: String,
    key: ModKey,
    version: String,
}

impl DependencyId {
    pub fn parse(raw: &str) -> ModResult<Self> {
        let invalid = || ModError::InvalidIdentifier(raw.to_string());
        let (namespace, rest) = raw.split_once(DEPENDENCY_SEPARATOR).ok_or_else(invalid)?;
        let (name, version) = rest.rsplit_once(DEPENDENCY_SEPARATOR).ok_or_else(invalid)?;
        if version.is_empty() {
            return Err(invalid());
        }
        let key = ModKey::new(namespace, name).map_err(|_| invalid())?;
        Ok(Self {
            raw: raw.to_string(),
            key,
            version: version.to_string(),
        })
    }

    pub fn key(&self) -> &ModKey {
        &self.key
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
