//! Core of entitykit: build-time query synthesis and a runtime dispatch
//! facade over descriptor-driven repositories.
//!
//! Build time: [`generate`] turns entity declarations into descriptors,
//! query specs and repository bindings. Run time: [`SqliteStore`] provides
//! repositories, [`RepositoryRegistry`] maps entities to them and
//! [`DispatchFacade`] serves every entity through one API.

pub mod config;
pub mod db;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, FacadeConfig, DEFAULT_PAGE_SIZE};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use metadata::diagnostic::{Diagnostic, Severity};
pub use metadata::extractor::MetadataExtractor;
pub use model::declaration::{
    CustomQueryDeclaration, EntityDeclaration, FieldDeclaration, SchemaDeclaration,
};
pub use model::descriptor::{
    EntityDescriptor, FieldDescriptor, FieldType, QueryParam, RecordValidationError, RelationKind,
};
pub use model::value::{ParamType, Record, Value, ARCHIVED_FIELD, ID_FIELD};
pub use query::generate::{generate, RepositoryBinding, SynthesisOutput};
pub use query::spec::{QueryKind, QuerySpec};
pub use repo::registry::{RegistryError, RepositoryRegistry, RepositoryRegistryBuilder};
pub use repo::repository::{
    Argument, Criterion, CriterionOp, Direction, Page, PageRequest, RepoError, RepoResult,
    Repository, ResolvedOperation, Sort, Specification,
};
pub use repo::sqlite_repo::{SqliteRepository, SqliteStore};
pub use service::cascade::CascadeMerger;
pub use service::facade::{DispatchFacade, FacadeError, FacadeResult};
pub use service::resolver_cache::{CacheStats, OperationKey, ResolutionError, ResolverCache};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
