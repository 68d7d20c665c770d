//! Turns secret identifiers into values, one blocking round-trip at a time.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::mapping::MappingTable;
use crate::store::{SecretStore, SecretStoreError, SecretValue};

/// Outcome of a single lookup. Failures are values, not errors: there is
/// deliberately no `Result` here to `?` out of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(SecretValue),
    Absent(SecretStoreError),
}

impl Resolution {
    pub fn into_value(self) -> Option<SecretValue> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Absent(_) => None,
        }
    }
}

/// Placeholder key → resolved value, holding successful lookups only.
#[derive(Debug, Clone, Default)]
pub struct ReplacementTable {
    entries: IndexMap<String, SecretValue>,
}

impl ReplacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SecretValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct SecretResolver<S> {
    store: S,
}

impl<S: SecretStore> SecretResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Looks up one identifier. Any store error is reported and downgraded.
    pub async fn resolve(&self, identifier: &str) -> Resolution {
        match self.store.get_secret_value(identifier).await {
            Ok(value) => {
                debug!("Resolved secret {}", identifier);
                Resolution::Resolved(value)
            }
            Err(e) => {
                warn!("Error retrieving secret {}: {}", identifier, e);
                Resolution::Absent(e)
            }
        }
    }

    /// Resolves every mapping entry sequentially, in mapping order. Repeated
    /// identifiers are fetched again; nothing is cached between entries.
    pub async fn resolve_all(&self, mapping: &MappingTable) -> ReplacementTable {
        let mut replacements = ReplacementTable::new();
        for (key, identifier) in mapping.iter() {
            if let Some(value) = self.resolve(identifier).await.into_value() {
                replacements.insert(key, value);
            }
        }
        replacements
    }
}
