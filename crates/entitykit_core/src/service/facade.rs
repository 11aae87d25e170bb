//! Generic runtime entry point over every registered entity.
//!
//! # Responsibility
//! - Forward CRUD, example and specification queries to the repository of
//!   the addressed entity.
//! - Derive finder names, resolve them through the resolver cache and
//!   execute them.
//! - Run free-text search, collection attach/add, cascading updates and
//!   archiving.
//!
//! # Invariants
//! - Caller input is validated before any storage interaction.
//! - Resolution failures propagate unchanged; nothing is retried.
//! - Bulk operations on empty input are no-ops with empty results.

use crate::config::FacadeConfig;
use crate::model::descriptor::{EntityDescriptor, RelationKind};
use crate::model::value::{ParamType, Record, Value, ARCHIVED_FIELD};
use crate::query::naming::{equality_finder_name, membership_finder_name, FREE_TEXT_OPERATION};
use crate::repo::registry::RepositoryRegistry;
use crate::repo::repository::{
    Argument, Page, PageRequest, RepoError, Repository, Sort, Specification,
};
use crate::service::cascade::CascadeMerger;
use crate::service::resolver_cache::{OperationKey, ResolutionError, ResolverCache};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type FacadeResult<T> = Result<T, FacadeError>;

#[derive(Debug)]
pub enum FacadeError {
    /// No repository is registered for the entity.
    UnmappedEntity(String),
    Resolution(ResolutionError),
    InvalidArgument(String),
    CycleDetected { entity: String, id: Uuid },
    Storage(RepoError),
}

impl Display for FacadeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnmappedEntity(entity) => write!(f, "no repository registered for `{entity}`"),
            Self::Resolution(err) => write!(f, "{err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::CycleDetected { entity, id } => {
                write!(f, "cascade revisits {entity} {id}; record graph has a cycle")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FacadeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolution(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for FacadeError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

impl From<ResolutionError> for FacadeError {
    fn from(value: ResolutionError) -> Self {
        Self::Resolution(value)
    }
}

/// Uniform data access across all registered entity types.
pub struct DispatchFacade {
    registry: RepositoryRegistry,
    cache: ResolverCache,
    config: FacadeConfig,
}

impl DispatchFacade {
    pub fn new(registry: RepositoryRegistry) -> Self {
        Self::with_config(registry, FacadeConfig::default())
    }

    pub fn with_config(registry: RepositoryRegistry, config: FacadeConfig) -> Self {
        info!(
            "event=facade_init module=service status=ok entities={} default_page_size={}",
            registry.len(),
            config.default_page_size
        );
        Self {
            registry,
            cache: ResolverCache::new(),
            config,
        }
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    pub fn config(&self) -> FacadeConfig {
        self.config
    }

    pub fn descriptor(&self, entity: &str) -> FacadeResult<&EntityDescriptor> {
        Ok(self.repository(entity)?.descriptor())
    }

    // Plain CRUD.

    pub fn find_all(&self, entity: &str) -> FacadeResult<Vec<Record>> {
        Ok(self.repository(entity)?.find_all(None)?)
    }

    pub fn find_all_sorted(&self, entity: &str, sort: &Sort) -> FacadeResult<Vec<Record>> {
        Ok(self.repository(entity)?.find_all(Some(sort))?)
    }

    pub fn find_all_paged(&self, entity: &str, request: &PageRequest) -> FacadeResult<Page<Record>> {
        Ok(self.repository(entity)?.find_page(request)?)
    }

    pub fn find_all_by_id(&self, entity: &str, ids: &[Uuid]) -> FacadeResult<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repository(entity)?.find_all_by_id(ids)?)
    }

    pub fn find_by_id(&self, entity: &str, id: Uuid) -> FacadeResult<Option<Record>> {
        Ok(self.repository(entity)?.find_by_id(id)?)
    }

    pub fn exists_by_id(&self, entity: &str, id: Uuid) -> FacadeResult<bool> {
        Ok(self.repository(entity)?.exists_by_id(id)?)
    }

    pub fn count(&self, entity: &str) -> FacadeResult<u64> {
        Ok(self.repository(entity)?.count()?)
    }

    pub fn delete_by_id(&self, entity: &str, id: Uuid) -> FacadeResult<()> {
        Ok(self.repository(entity)?.delete_by_id(id)?)
    }

    pub fn delete(&self, record: &Record) -> FacadeResult<()> {
        Ok(self.repository(record.entity())?.delete(record)?)
    }

    pub fn delete_all(&self, records: &[Record]) -> FacadeResult<()> {
        let Some(entity) = common_entity(records)? else {
            return Ok(());
        };
        Ok(self.repository(entity)?.delete_all(records)?)
    }

    /// Deletes every row of `entity`.
    pub fn delete_all_of(&self, entity: &str) -> FacadeResult<()> {
        Ok(self.repository(entity)?.delete_everything()?)
    }

    pub fn save(&self, record: Record) -> FacadeResult<Record> {
        Ok(self.repository(record.entity())?.save(record)?)
    }

    pub fn save_all(&self, records: Vec<Record>) -> FacadeResult<Vec<Record>> {
        let Some(entity) = common_entity(&records)? else {
            return Ok(Vec::new());
        };
        let repository = self.repository(entity)?;
        Ok(repository.save_all(records)?)
    }

    pub fn flush(&self, entity: &str) -> FacadeResult<()> {
        Ok(self.repository(entity)?.flush()?)
    }

    pub fn save_and_flush(&self, record: Record) -> FacadeResult<Record> {
        Ok(self.repository(record.entity())?.save_and_flush(record)?)
    }

    pub fn delete_in_batch(&self, records: &[Record]) -> FacadeResult<()> {
        let Some(entity) = common_entity(records)? else {
            return Ok(());
        };
        Ok(self.repository(entity)?.delete_in_batch(records)?)
    }

    pub fn delete_all_in_batch(&self, entity: &str) -> FacadeResult<()> {
        Ok(self.repository(entity)?.delete_all_in_batch()?)
    }

    /// Returns the record with `id`; a missing row is a storage `NotFound`.
    pub fn get_one(&self, entity: &str, id: Uuid) -> FacadeResult<Record> {
        Ok(self.repository(entity)?.get_one(id)?)
    }

    // Example queries: the probe's entity selects the repository.

    pub fn find_one_by_example(&self, probe: &Record) -> FacadeResult<Option<Record>> {
        let matches = self.repository(probe.entity())?.find_by_example(probe, None)?;
        at_most_one(probe.entity(), matches)
    }

    pub fn find_all_by_example(&self, probe: &Record) -> FacadeResult<Vec<Record>> {
        Ok(self.repository(probe.entity())?.find_by_example(probe, None)?)
    }

    pub fn find_all_by_example_sorted(&self, probe: &Record, sort: &Sort) -> FacadeResult<Vec<Record>> {
        Ok(self
            .repository(probe.entity())?
            .find_by_example(probe, Some(sort))?)
    }

    pub fn find_page_by_example(
        &self,
        probe: &Record,
        request: &PageRequest,
    ) -> FacadeResult<Page<Record>> {
        Ok(self
            .repository(probe.entity())?
            .find_page_by_example(probe, request)?)
    }

    pub fn count_by_example(&self, probe: &Record) -> FacadeResult<u64> {
        Ok(self.repository(probe.entity())?.count_by_example(probe)?)
    }

    pub fn exists_by_example(&self, probe: &Record) -> FacadeResult<bool> {
        Ok(self.count_by_example(probe)? > 0)
    }

    // Specification queries.

    pub fn find_one_by_spec(&self, entity: &str, spec: &Specification) -> FacadeResult<Option<Record>> {
        let matches = self.repository(entity)?.find_by_spec(spec, None)?;
        at_most_one(entity, matches)
    }

    pub fn find_all_by_spec(&self, entity: &str, spec: &Specification) -> FacadeResult<Vec<Record>> {
        Ok(self.repository(entity)?.find_by_spec(spec, None)?)
    }

    pub fn find_all_by_spec_sorted(
        &self,
        entity: &str,
        spec: &Specification,
        sort: &Sort,
    ) -> FacadeResult<Vec<Record>> {
        Ok(self.repository(entity)?.find_by_spec(spec, Some(sort))?)
    }

    pub fn find_page_by_spec(
        &self,
        entity: &str,
        spec: &Specification,
        request: &PageRequest,
    ) -> FacadeResult<Page<Record>> {
        Ok(self.repository(entity)?.find_page_by_spec(spec, request)?)
    }

    pub fn count_by_spec(&self, entity: &str, spec: &Specification) -> FacadeResult<u64> {
        Ok(self.repository(entity)?.count_by_spec(spec)?)
    }

    // Attribute lookup.

    /// Runs `findBy<Attribute>` with one value.
    pub fn get_by(
        &self,
        entity: &str,
        attribute: &str,
        value: impl Into<Value>,
    ) -> FacadeResult<Vec<Record>> {
        let value = value.into();
        if value.is_null() {
            return Err(FacadeError::InvalidArgument(format!(
                "lookup of `{entity}.{attribute}` needs a non-null value"
            )));
        }
        self.select_by_resolver(entity, &equality_finder_name(attribute), vec![Argument::One(value)])
    }

    /// Like [`Self::get_by`] but expects at most one match.
    pub fn get_by_unique(
        &self,
        entity: &str,
        attribute: &str,
        value: impl Into<Value>,
    ) -> FacadeResult<Option<Record>> {
        let matches = self.get_by(entity, attribute, value)?;
        at_most_one(entity, matches)
    }

    /// Runs `findAllBy<Attribute>In` with a value set.
    pub fn get_all_by(
        &self,
        entity: &str,
        attribute: &str,
        values: Vec<Value>,
    ) -> FacadeResult<Vec<Record>> {
        if values.iter().any(Value::is_null) {
            return Err(FacadeError::InvalidArgument(format!(
                "lookup of `{entity}.{attribute}` cannot match null"
            )));
        }
        self.select_by_resolver(
            entity,
            &membership_finder_name(attribute),
            vec![Argument::Many(values)],
        )
    }

    /// Resolves `name` by the runtime types of `args` and executes it.
    pub fn select_by_resolver(
        &self,
        entity: &str,
        name: &str,
        args: Vec<Argument>,
    ) -> FacadeResult<Vec<Record>> {
        let mut signature = Vec::with_capacity(args.len());
        for arg in &args {
            let Some(param_type) = arg.param_type() else {
                return Err(FacadeError::InvalidArgument(format!(
                    "argument of `{entity}.{name}` has no type"
                )));
            };
            signature.push(param_type);
        }

        let repository = self.repository(entity)?;
        let operation = self.cache.resolve(
            repository.as_ref(),
            OperationKey::new(entity, name, signature),
        )?;
        Ok(repository.execute(&operation, &args, None)?)
    }

    // Free-text search.

    /// First page of matches with the default page size.
    pub fn fuzzy_search_by(&self, entity: &str, term: &str) -> FacadeResult<Vec<Record>> {
        self.fuzzy_search_paged(entity, term, 0, self.config.default_page_size, None)
    }

    /// Page `offset` (zero-based page index) of `limit` matches.
    pub fn fuzzy_search_paged(
        &self,
        entity: &str,
        term: &str,
        offset: u32,
        limit: u32,
        sort: Option<Sort>,
    ) -> FacadeResult<Vec<Record>> {
        if term.trim().is_empty() {
            return Err(FacadeError::InvalidArgument(
                "search term cannot be blank".to_string(),
            ));
        }
        if limit == 0 {
            return Err(FacadeError::InvalidArgument(
                "page size must be greater than zero".to_string(),
            ));
        }

        let repository = self.repository(entity)?;
        if let Some(sort) = &sort {
            let sortable = repository
                .descriptor()
                .field(&sort.field)
                .is_some_and(|field| field.is_scalar());
            if !sortable {
                return Err(FacadeError::InvalidArgument(format!(
                    "cannot sort `{entity}` by `{}`",
                    sort.field
                )));
            }
        }

        let operation = self.cache.resolve(
            repository.as_ref(),
            OperationKey::new(
                entity,
                FREE_TEXT_OPERATION,
                vec![ParamType::Text, ParamType::Page],
            ),
        )?;
        let request = PageRequest {
            page: offset,
            size: limit,
            sort,
        };
        let results = repository.execute(
            &operation,
            &[Argument::One(Value::from(term))],
            Some(&request),
        )?;
        debug!(
            "event=fuzzy_search module=service status=ok entity={} page={} size={} hits={}",
            entity,
            offset,
            limit,
            results.len()
        );
        Ok(results)
    }

    // Collections.

    /// Saves `items`, then appends them to `owner.field` and saves the owner.
    pub fn add_new_to_collection_in(
        &self,
        owner: &Record,
        field: &str,
        items: Vec<Record>,
    ) -> FacadeResult<Vec<Record>> {
        let Some(item_entity) = common_entity(&items)? else {
            return Ok(Vec::new());
        };
        let (owner_repository, mut owner) = self.collection_owner(owner, field, item_entity)?;

        let saved = self.repository(item_entity)?.save_all(items)?;
        append_to_collection(&mut owner, field, &saved);
        owner_repository.save(owner)?;
        Ok(saved)
    }

    /// Re-fetches `items` by id, appends them to `owner.field` and saves the
    /// owner. Items that no longer exist are skipped.
    pub fn attach_existing_to_collection_in(
        &self,
        owner: &Record,
        field: &str,
        items: &[Record],
    ) -> FacadeResult<Vec<Record>> {
        let Some(item_entity) = common_entity(items)? else {
            return Ok(Vec::new());
        };
        let ids = items
            .iter()
            .map(|item| {
                item.id().ok_or_else(|| {
                    FacadeError::InvalidArgument(format!(
                        "cannot attach an unsaved `{item_entity}`"
                    ))
                })
            })
            .collect::<FacadeResult<Vec<Uuid>>>()?;
        let (owner_repository, mut owner) = self.collection_owner(owner, field, item_entity)?;

        let attached = self.repository(item_entity)?.find_all_by_id(&ids)?;
        append_to_collection(&mut owner, field, &attached);
        owner_repository.save(owner)?;
        Ok(attached)
    }

    // Cascading updates.

    pub fn cascaded_update(&self, target: Record, source: &Record) -> FacadeResult<Record> {
        let merged = CascadeMerger::new(&self.registry).merge(target, source)?;
        info!(
            "event=cascade_update module=service status=ok entity={}",
            merged.entity()
        );
        Ok(merged)
    }

    /// Merges `sources` into `targets` pairwise. Merged targets are already
    /// persisted by the merge; targets without a source are saved as given.
    pub fn cascade_update_collection(
        &self,
        targets: Vec<Record>,
        sources: &[Record],
    ) -> FacadeResult<Vec<Record>> {
        let Some(entity) = common_entity(&targets)?.map(str::to_string) else {
            return Ok(Vec::new());
        };
        let repository = Arc::clone(self.repository(&entity)?);
        let merger = CascadeMerger::new(&self.registry);

        let mut updated = Vec::with_capacity(targets.len());
        let mut sources = sources.iter();
        for target in targets {
            match sources.next() {
                Some(source) => updated.push(merger.merge(target, source)?),
                None => updated.push(repository.save(target)?),
            }
        }
        Ok(updated)
    }

    // Archiving.

    pub fn archive(&self, record: &Record) -> FacadeResult<Record> {
        self.set_archived(record, true)
    }

    pub fn de_archive(&self, record: &Record) -> FacadeResult<Record> {
        self.set_archived(record, false)
    }

    pub fn archive_all(&self, records: &[Record]) -> FacadeResult<Vec<Record>> {
        self.set_all_archived(records, true)
    }

    pub fn de_archive_all(&self, records: &[Record]) -> FacadeResult<Vec<Record>> {
        self.set_all_archived(records, false)
    }

    fn set_archived(&self, record: &Record, archived: bool) -> FacadeResult<Record> {
        let mut saved = self.set_all_archived(std::slice::from_ref(record), archived)?;
        saved
            .pop()
            .ok_or_else(|| FacadeError::InvalidArgument("nothing to archive".to_string()))
    }

    fn set_all_archived(&self, records: &[Record], archived: bool) -> FacadeResult<Vec<Record>> {
        let Some(entity) = common_entity(records)? else {
            return Ok(Vec::new());
        };
        let repository = self.repository(entity)?;
        if !repository.descriptor().archivable {
            return Err(FacadeError::InvalidArgument(format!(
                "`{entity}` is not archivable"
            )));
        }

        let mut patches = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id().ok_or_else(|| {
                FacadeError::InvalidArgument(format!("cannot archive an unsaved `{entity}`"))
            })?;
            if !repository.exists_by_id(id)? {
                return Err(RepoError::NotFound {
                    entity: entity.to_string(),
                    id,
                }
                .into());
            }
            let mut patch = Record::new(entity).with(ARCHIVED_FIELD, archived);
            patch.set_id(id);
            patches.push(patch);
        }
        Ok(repository.save_all(patches)?)
    }

    fn repository(&self, entity: &str) -> FacadeResult<&Arc<dyn Repository>> {
        self.registry
            .get(entity)
            .ok_or_else(|| FacadeError::UnmappedEntity(entity.to_string()))
    }

    /// Validates the collection field and re-fetches the owner by id.
    fn collection_owner(
        &self,
        owner: &Record,
        field: &str,
        item_entity: &str,
    ) -> FacadeResult<(&Arc<dyn Repository>, Record)> {
        let repository = self.repository(owner.entity())?;
        let descriptor = repository.descriptor();
        let target = descriptor
            .field(field)
            .filter(|candidate| candidate.relation() == RelationKind::ToMany)
            .and_then(|candidate| candidate.related_entity())
            .ok_or_else(|| {
                FacadeError::InvalidArgument(format!(
                    "`{}.{field}` is not a collection",
                    descriptor.name
                ))
            })?;
        if target != item_entity {
            return Err(FacadeError::InvalidArgument(format!(
                "`{}.{field}` holds `{target}`, not `{item_entity}`",
                descriptor.name
            )));
        }

        let missing_owner = || {
            FacadeError::InvalidArgument(format!(
                "could not find a `{}` with the given id",
                descriptor.name
            ))
        };
        let id = owner.id().ok_or_else(missing_owner)?;
        let persisted = repository.find_by_id(id)?.ok_or_else(missing_owner)?;
        Ok((repository, persisted))
    }
}

/// Entity shared by all `records`; `None` when empty.
fn common_entity(records: &[Record]) -> FacadeResult<Option<&str>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let entity = first.entity();
    if let Some(other) = records.iter().find(|record| record.entity() != entity) {
        return Err(FacadeError::InvalidArgument(format!(
            "mixed entity types `{entity}` and `{}` in one call",
            other.entity()
        )));
    }
    Ok(Some(entity))
}

fn at_most_one(entity: &str, mut matches: Vec<Record>) -> FacadeResult<Option<Record>> {
    if matches.len() > 1 {
        return Err(FacadeError::InvalidArgument(format!(
            "expected at most one `{entity}`, found {}",
            matches.len()
        )));
    }
    Ok(matches.pop())
}

fn append_to_collection(owner: &mut Record, field: &str, items: &[Record]) {
    let mut collection = owner.list(field).map(<[Record]>::to_vec).unwrap_or_default();
    collection.extend_from_slice(items);
    owner.set(field, Value::List(collection));
}
