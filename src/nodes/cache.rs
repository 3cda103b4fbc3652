//! Memoized per-callable data
//!
//! Signature records and widget metadata are derived once per callable and
//! shared by every node that uses it. Entries are write-once: a key that is
//! already present keeps its first value.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::debug;

use crate::error::ValidationError;
use crate::nodes::signature::SignatureRecord;
use crate::nodes::widgets::{resolve_signature_widgets, WidgetMeta};

/// Signature records keyed by callable cache key (see
/// [`CallableSource::cache_key`](crate::nodes::CallableSource::cache_key))
#[derive(Debug, Default)]
pub struct SignatureCache {
    records: HashMap<String, Arc<SignatureRecord>>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<SignatureRecord>> {
        self.records.get(key).cloned()
    }

    /// Returns the cached record, computing and storing it on first use
    pub fn get_or_try_insert<F>(&mut self, key: &str, compute: F) -> Result<Arc<SignatureRecord>, ValidationError>
    where
        F: FnOnce() -> Result<SignatureRecord, ValidationError>,
    {
        if let Some(record) = self.records.get(key) {
            return Ok(Arc::clone(record));
        }
        let record = Arc::new(compute()?);
        debug!("Cached signature of {}", key);
        self.records.insert(key.to_string(), Arc::clone(&record));
        Ok(record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Widget metadata per parameter, keyed like [`SignatureCache`]
#[derive(Debug, Default)]
pub struct WidgetMetaCache {
    metas: HashMap<String, Arc<BTreeMap<String, WidgetMeta>>>,
}

impl WidgetMetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widget metadata of every parameter of `signature` that has a widget
    pub fn metas_for(
        &mut self,
        key: &str,
        signature: &SignatureRecord,
    ) -> Result<Arc<BTreeMap<String, WidgetMeta>>, ValidationError> {
        if let Some(metas) = self.metas.get(key) {
            return Ok(Arc::clone(metas));
        }
        let metas = Arc::new(resolve_signature_widgets(signature)?);
        self.metas.insert(key.to_string(), Arc::clone(&metas));
        Ok(metas)
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::signature::{ParamDecl, SignatureDecl};

    fn decl() -> SignatureDecl {
        SignatureDecl::new(vec![
            ParamDecl::positional("x"),
            ParamDecl::positional("flag").with_default(true),
        ])
    }

    #[test]
    fn test_signature_cache_is_write_once() {
        let mut cache = SignatureCache::new();
        let first = cache
            .get_or_try_insert("builtin:f", || SignatureRecord::from_decl("f", &decl()))
            .unwrap();
        let second = cache
            .get_or_try_insert("builtin:f", || panic!("must not recompute"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_computation_is_not_cached() {
        let mut cache = SignatureCache::new();
        let result = cache.get_or_try_insert("builtin:g", || {
            Err(ValidationError::MalformedDocument("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_widget_meta_cache() {
        let record = SignatureRecord::from_decl("f", &decl()).unwrap();
        let mut cache = WidgetMetaCache::new();
        let metas = cache.metas_for("builtin:f", &record).unwrap();
        assert_eq!(metas.len(), 1);
        assert_eq!(metas["flag"].widget_name, "check_button");
        let again = cache.metas_for("builtin:f", &record).unwrap();
        assert!(Arc::ptr_eq(&metas, &again));
    }
}
