//! Insertion-ordered model catalog.
//!
//! Host configs and the gateway both describe models as a JSON object keyed by
//! model id. The order of those keys is user-visible (it becomes the provider
//! whitelist), so the catalog keeps entries in insertion order instead of
//! sorting them the way `serde_json::Map` does.

use {
    indexmap::IndexMap,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// A single model as exposed by the gateway or authored in host config.
///
/// Only `id` and `name` are interpreted; everything else the gateway sends
/// (limits, pricing, modalities, ...) is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Mapping from model id to [`ModelEntry`] that remembers insertion order.
///
/// Equality is order-sensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    entries: IndexMap<String, ModelEntry>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.entries.get(id)
    }

    /// Insert or replace an entry. A replaced entry keeps its original
    /// position; a new entry is appended.
    pub fn insert(&mut self, id: impl Into<String>, entry: ModelEntry) -> Option<ModelEntry> {
        self.entries.insert(id.into(), entry)
    }

    pub fn remove(&mut self, id: &str) -> Option<ModelEntry> {
        self.entries.shift_remove(id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &ModelEntry) -> bool) {
        self.entries.retain(|id, entry| keep(id, entry));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }
}

impl PartialEq for ModelCatalog {
    fn eq(&self, other: &Self) -> bool {
        self.entries.iter().eq(other.entries.iter())
    }
}

impl FromIterator<(String, ModelEntry)> for ModelCatalog {
    fn from_iter<I: IntoIterator<Item = (String, ModelEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ModelCatalog {
    type IntoIter = indexmap::map::IntoIter<String, ModelEntry>;
    type Item = (String, ModelEntry);

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
