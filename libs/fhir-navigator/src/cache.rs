//! Compiled-regex cache
//!
//! Element regexes repeat heavily across a catalog (every `code` element
//! shares one pattern), so compilations are cached. The store is
//! write-once-read-many: the same source always maps to an equivalent
//! compiled tester.

use crate::error::{Error, Result};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const DEFAULT_CAPACITY: usize = 512;

pub struct RegexCache {
    inner: Mutex<LruCache<String, Arc<Regex>>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Get or compile a full-match tester for an element regex source.
    ///
    /// FHIR element regexes are implicitly anchored; the source is wrapped in
    /// `^(?:...)$` before compilation.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Regex>> {
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(compiled) = cache.get(source) {
            return Ok(compiled.clone());
        }
        let anchored = format!("^(?:{source})$");
        let compiled = Regex::new(&anchored).map_err(|e| Error::InvalidRegex {
            pattern: source.to_string(),
            detail: e.to_string(),
        })?;
        let compiled = Arc::new(compiled);
        cache.put(source.to_string(), compiled.clone());
        Ok(compiled)
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}
