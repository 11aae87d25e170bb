//! Entity-to-repository registry, built once at startup.
//!
//! # Responsibility
//! - Map each entity simple name to the repository handle serving it.
//! - Offer discovery from `<Entity>Repository` handle names and explicit
//!   binding.
//!
//! # Invariants
//! - Keys are unique and matched exactly.
//! - A handle is only bound to the entity its descriptor describes.
//! - The built registry is immutable.

use crate::model::descriptor::REPOSITORY_SUFFIX;
use crate::repo::repository::Repository;
use log::{debug, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Registration errors raised while building the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateEntity(String),
    InvalidEntityName(String),
    /// The handle serves a different entity than the one it is bound to.
    EntityMismatch { entity: String, handle: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity(entity) => {
                write!(f, "entity already bound to a repository: {entity}")
            }
            Self::InvalidEntityName(entity) => write!(f, "entity name is invalid: `{entity}`"),
            Self::EntityMismatch { entity, handle } => {
                write!(f, "repository `{handle}` cannot serve entity `{entity}`")
            }
        }
    }
}

impl Error for RegistryError {}

/// Immutable entity-to-repository map.
#[derive(Default)]
pub struct RepositoryRegistry {
    repositories: BTreeMap<String, Arc<dyn Repository>>,
}

impl RepositoryRegistry {
    pub fn builder() -> RepositoryRegistryBuilder {
        RepositoryRegistryBuilder::default()
    }

    pub fn get(&self, entity: &str) -> Option<&Arc<dyn Repository>> {
        self.repositories.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.repositories.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Returns sorted entity names.
    pub fn entities(&self) -> Vec<String> {
        self.repositories.keys().cloned().collect()
    }
}

#[derive(Default)]
pub struct RepositoryRegistryBuilder {
    repositories: BTreeMap<String, Arc<dyn Repository>>,
}

impl RepositoryRegistryBuilder {
    /// Registers handles by their declared name.
    ///
    /// A handle named `<Entity>Repository` is bound to `<Entity>`. Handles
    /// that do not follow the convention are skipped.
    pub fn discover<I>(mut self, handles: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Arc<dyn Repository>>,
    {
        for handle in handles {
            let Some(entity) = entity_from_handle_name(handle.name()) else {
                debug!(
                    "event=registry_discover module=repo status=skipped handle={}",
                    handle.name()
                );
                continue;
            };
            let entity = entity.to_string();
            self = self.bind(entity, handle)?;
        }
        Ok(self)
    }

    /// Binds `handle` to `entity` explicitly.
    pub fn bind(
        mut self,
        entity: impl Into<String>,
        handle: Arc<dyn Repository>,
    ) -> Result<Self, RegistryError> {
        let entity = entity.into();
        if entity.trim().is_empty() || entity.trim() != entity {
            return Err(RegistryError::InvalidEntityName(entity));
        }
        if handle.descriptor().name != entity {
            return Err(RegistryError::EntityMismatch {
                entity,
                handle: handle.name().to_string(),
            });
        }
        if self.repositories.contains_key(&entity) {
            return Err(RegistryError::DuplicateEntity(entity));
        }
        debug!(
            "event=registry_bind module=repo status=ok entity={} handle={}",
            entity,
            handle.name()
        );
        self.repositories.insert(entity, handle);
        Ok(self)
    }

    pub fn build(self) -> RepositoryRegistry {
        info!(
            "event=registry_build module=repo status=ok entities={}",
            self.repositories.len()
        );
        RepositoryRegistry {
            repositories: self.repositories,
        }
    }
}

/// Owning entity of a handle named `<Entity>Repository`.
pub fn entity_from_handle_name(name: &str) -> Option<&str> {
    name.strip_suffix(REPOSITORY_SUFFIX)
        .filter(|entity| !entity.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{entity_from_handle_name, RegistryError, RepositoryRegistry};
    use crate::db::open_db_in_memory;
    use crate::model::declaration::{EntityDeclaration, FieldDeclaration};
    use crate::query::generate::generate;
    use crate::repo::repository::Repository;
    use crate::repo::sqlite_repo::SqliteStore;
    use std::sync::Arc;

    fn store() -> Arc<SqliteStore> {
        let output = generate(&[
            EntityDeclaration::new("Book").field(FieldDeclaration::text("title")),
            EntityDeclaration::new("Author").field(FieldDeclaration::text("name")),
        ]);
        SqliteStore::open(open_db_in_memory().expect("db should open"), &output)
            .expect("store should open")
    }

    #[test]
    fn handle_names_map_to_entities() {
        assert_eq!(entity_from_handle_name("BookRepository"), Some("Book"));
        assert_eq!(entity_from_handle_name("Repository"), None);
        assert_eq!(entity_from_handle_name("BookDao"), None);
    }

    #[test]
    fn discovery_binds_conventional_handles_and_skips_others() {
        let store = store();
        let odd: Arc<dyn Repository> = Arc::new(
            store
                .repository("Author")
                .expect("author repository")
                .with_name("AuthorStorage"),
        );
        let book: Arc<dyn Repository> =
            Arc::new(store.repository("Book").expect("book repository"));

        let registry = RepositoryRegistry::builder()
            .discover(vec![book, odd])
            .expect("discovery should succeed")
            .build();

        assert_eq!(registry.entities(), vec!["Book".to_string()]);
        assert!(!registry.contains("Author"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let store = store();
        let handles = store.repositories();
        let builder = RepositoryRegistry::builder()
            .discover(handles.clone())
            .expect("first discovery");
        let error = builder
            .bind("Book", Arc::clone(&handles[1]))
            .err()
            .expect("duplicate binding must fail");
        assert_eq!(error, RegistryError::DuplicateEntity("Book".to_string()));
    }

    #[test]
    fn binding_a_handle_to_another_entity_is_rejected() {
        let store = store();
        let book: Arc<dyn Repository> =
            Arc::new(store.repository("Book").expect("book repository"));

        let error = RepositoryRegistry::builder()
            .bind("Author", book)
            .err()
            .expect("mismatched binding must fail");
        assert_eq!(
            error,
            RegistryError::EntityMismatch {
                entity: "Author".to_string(),
                handle: "BookRepository".to_string(),
            }
        );
    }

    #[test]
    fn discovered_name_must_match_the_served_entity() {
        let store = store();
        let renamed: Arc<dyn Repository> = Arc::new(
            store
                .repository("Book")
                .expect("book repository")
                .with_name("AuthorRepository"),
        );
        let error = RepositoryRegistry::builder()
            .discover(vec![renamed])
            .err()
            .expect("mismatched discovery must fail");
        assert!(matches!(error, RegistryError::EntityMismatch { .. }));
    }
}
