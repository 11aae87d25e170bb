//! Lazily populated cache of resolved repository operations.
//!
//! # Responsibility
//! - Map (entity, operation, signature) to the executable handle a
//!   repository hands out for it.
//! - Resolve on miss and keep entries for the lifetime of the cache.
//!
//! # Invariants
//! - Entries are never evicted.
//! - Concurrent resolution of one key is safe: repositories return the same
//!   handle, so the last write stores an equal value.
//! - Resolution failures are not cached and not retried.

use crate::model::value::ParamType;
use crate::repo::repository::{Repository, ResolvedOperation};
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Cache key of one resolved operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    pub entity: String,
    pub operation: String,
    pub signature: Vec<ParamType>,
}

impl OperationKey {
    pub fn new(
        entity: impl Into<String>,
        operation: impl Into<String>,
        signature: Vec<ParamType>,
    ) -> Self {
        Self {
            entity: entity.into(),
            operation: operation.into(),
            signature,
        }
    }
}

/// No operation with the requested name and signature exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub entity: String,
    pub operation: String,
    pub signature: Vec<ParamType>,
}

impl From<&OperationKey> for ResolutionError {
    fn from(key: &OperationKey) -> Self {
        Self {
            entity: key.entity.clone(),
            operation: key.operation.clone(),
            signature: key.signature.clone(),
        }
    }
}

impl Display for ResolutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let signature: Vec<&str> = self.signature.iter().map(|param| param.as_str()).collect();
        write!(
            f,
            "no operation `{}({})` on entity `{}`",
            self.operation,
            signature.join(", "),
            self.entity
        )
    }
}

impl Error for ResolutionError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub size: usize,
}

#[derive(Default)]
pub struct ResolverCache {
    entries: RwLock<HashMap<OperationKey, Arc<ResolvedOperation>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &OperationKey) -> Option<Arc<ResolvedOperation>> {
        let found = self.entries.read().get(key).cloned();
        // Stats are best-effort; relaxed ordering is enough.
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Stores a handle; an existing entry for the key is replaced.
    pub fn put(&self, key: OperationKey, handle: Arc<ResolvedOperation>) {
        self.entries.write().insert(key, handle);
    }

    /// Returns the cached handle or resolves it against `repository`.
    pub fn resolve(
        &self,
        repository: &dyn Repository,
        key: OperationKey,
    ) -> Result<Arc<ResolvedOperation>, ResolutionError> {
        if let Some(handle) = self.get(&key) {
            return Ok(handle);
        }

        let Some(handle) = repository.operation(&key.operation, &key.signature) else {
            debug!(
                "event=resolve module=service status=error entity={} operation={}",
                key.entity, key.operation
            );
            return Err(ResolutionError::from(&key));
        };

        debug!(
            "event=resolve module=service status=ok entity={} operation={}",
            key.entity, key.operation
        );
        self.put(key, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationKey, ResolutionError, ResolverCache};
    use crate::db::open_db_in_memory;
    use crate::model::declaration::{EntityDeclaration, FieldDeclaration};
    use crate::model::value::ParamType;
    use crate::query::generate::generate;
    use crate::repo::sqlite_repo::{SqliteRepository, SqliteStore};
    use std::sync::Arc;

    fn books() -> SqliteRepository {
        let output = generate(&[EntityDeclaration::new("Book")
            .field(FieldDeclaration::text("title").searchable())]);
        let store = SqliteStore::open(open_db_in_memory().expect("db should open"), &output)
            .expect("store should open");
        store.repository("Book").expect("book repository")
    }

    #[test]
    fn second_lookup_is_a_hit_with_the_same_handle() {
        let cache = ResolverCache::new();
        let repository = books();
        let key = OperationKey::new("Book", "findByTitle", vec![ParamType::Text]);

        let first = cache
            .resolve(&repository, key.clone())
            .expect("finder should resolve");
        let second = cache.resolve(&repository, key).expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[test]
    fn unknown_operation_is_not_cached() {
        let cache = ResolverCache::new();
        let repository = books();
        let key = OperationKey::new("Book", "findByIsbn", vec![ParamType::Text]);

        let error = cache
            .resolve(&repository, key)
            .expect_err("unknown attribute must fail");
        assert_eq!(
            error,
            ResolutionError {
                entity: "Book".to_string(),
                operation: "findByIsbn".to_string(),
                signature: vec![ParamType::Text],
            }
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn signature_is_part_of_the_key() {
        let cache = ResolverCache::new();
        let repository = books();
        let key = OperationKey::new("Book", "findByTitle", vec![ParamType::Integer]);
        assert!(cache.resolve(&repository, key).is_err());
    }
}
