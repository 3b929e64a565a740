use kilo_config::{ModelCatalog, settings::DEFAULT_FREE_SUFFIX};

/// Decides whether a model can be used without a paid key.
pub trait FreeTierPolicy: Send + Sync {
    fn is_free(&self, model_id: &str) -> bool;
}

/// Free iff the model id ends with a fixed suffix (`:free` on the gateway).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixPolicy {
    suffix: String,
}

impl SuffixPolicy {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Default for SuffixPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_SUFFIX)
    }
}

impl FreeTierPolicy for SuffixPolicy {
    fn is_free(&self, model_id: &str) -> bool {
        model_id.ends_with(&self.suffix)
    }
}

/// The free-tier subsequence of `catalog`, in the same order.
pub fn filter_free(catalog: &ModelCatalog, policy: &dyn FreeTierPolicy) -> ModelCatalog {
    catalog
        .iter()
        .filter(|(id, _)| policy.is_free(id))
        .map(|(id, entry)| (id.to_string(), entry.clone()))
        .collect()
}
