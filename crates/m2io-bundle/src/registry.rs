#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use m2io_model::Digest;

use crate::bundle::Bundle;

/// Where bundles are looked up. Persistence is up to the implementation; the
/// engine only needs retrieval by digest or alias.
pub trait BundleStore: Send + Sync {
    /// Bundle with computed digest `digest`.
    fn get(&self, digest: &Digest) -> Option<Arc<Bundle>>;

    /// Bundle named by `reference`: a computed digest, a declared digest or
    /// an alias.
    fn lookup(&self, reference: &str) -> Option<Arc<Bundle>>;
}

#[derive(Debug, Default)]
struct Entries {
    by_digest: BTreeMap<Digest, Arc<Bundle>>,
    names: BTreeMap<String, Digest>,
}

/// In-memory [`BundleStore`]. Cloning shares the underlying entries.
#[derive(Debug, Clone, Default)]
pub struct BundleRegistry {
    entries: Arc<RwLock<Entries>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bundle`. A bundle with the same digest already present is kept
    /// and returned instead; the new copy's declared digest and alias still
    /// name it.
    pub fn insert(&self, bundle: Bundle) -> Arc<Bundle> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let digest = bundle.digest().clone();
        if let Some(declared) = bundle.declared_digest() {
            entries
                .names
                .insert(declared.as_str().to_string(), digest.clone());
        }
        if let Some(alias) = bundle.alias() {
            entries.names.insert(alias.to_string(), digest.clone());
        }
        if let Some(existing) = entries.by_digest.get(&digest) {
            return Arc::clone(existing);
        }
        let bundle = Arc::new(bundle);
        entries.by_digest.insert(digest, Arc::clone(&bundle));
        bundle
    }

    /// Point `alias` at `digest`, which may be a computed digest or a declared
    /// one. The bundle need not be loaded yet.
    pub fn register_alias(&self, alias: impl Into<String>, digest: Digest) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .names
            .insert(alias.into(), digest);
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_digest
            .contains_key(digest)
    }

    pub fn digests(&self) -> Vec<Digest> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_digest
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_digest
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BundleStore for BundleRegistry {
    fn get(&self, digest: &Digest) -> Option<Arc<Bundle>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_digest
            .get(digest)
            .cloned()
    }

    fn lookup(&self, reference: &str) -> Option<Arc<Bundle>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let reference = reference.trim();
        Digest::new(reference)
            .ok()
            .and_then(|digest| entries.by_digest.get(&digest).cloned())
            .or_else(|| {
                let named = entries.names.get(reference)?;
                entries
                    .by_digest
                    .get(named)
                    .or_else(|| {
                        entries
                            .names
                            .get(named.as_str())
                            .and_then(|digest| entries.by_digest.get(digest))
                    })
                    .cloned()
            })
    }
}
