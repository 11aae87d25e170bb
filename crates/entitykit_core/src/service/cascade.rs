//! Recursive merge of a source snapshot into a persisted record graph.
//!
//! # Responsibility
//! - Copy present source values into the target, field by field.
//! - Descend into to-one relations, substituting default instances for
//!   missing targets.
//! - Persist every merged node bottom-up.
//!
//! # Invariants
//! - Absent source values never clear target values.
//! - Collections are left untouched.
//! - A target node revisited on the current path fails with `CycleDetected`.

use crate::model::descriptor::RelationKind;
use crate::model::value::{Record, Value};
use crate::repo::registry::RepositoryRegistry;
use crate::service::facade::{FacadeError, FacadeResult};
use uuid::Uuid;

/// Descriptor-driven merge over the repositories of one registry.
pub struct CascadeMerger<'a> {
    registry: &'a RepositoryRegistry,
}

impl<'a> CascadeMerger<'a> {
    pub fn new(registry: &'a RepositoryRegistry) -> Self {
        Self { registry }
    }

    /// Merges `source` into `target` and returns the persisted target.
    pub fn merge(&self, target: Record, source: &Record) -> FacadeResult<Record> {
        self.merge_node(target, source, &mut Vec::new())
    }

    fn merge_node(
        &self,
        mut target: Record,
        source: &Record,
        path: &mut Vec<(String, Uuid)>,
    ) -> FacadeResult<Record> {
        if target.entity() != source.entity() {
            return Err(FacadeError::InvalidArgument(format!(
                "cannot merge a `{}` into a `{}`",
                source.entity(),
                target.entity()
            )));
        }

        let repository = self
            .registry
            .get(target.entity())
            .ok_or_else(|| FacadeError::UnmappedEntity(target.entity().to_string()))?;

        let node = target.id().map(|id| (target.entity().to_string(), id));
        if let Some((entity, id)) = &node {
            if path
                .iter()
                .any(|(seen_entity, seen_id)| seen_entity == entity && seen_id == id)
            {
                return Err(FacadeError::CycleDetected {
                    entity: entity.clone(),
                    id: *id,
                });
            }
        }
        if let Some(node) = node.clone() {
            path.push(node);
        }

        let merged = self.merge_fields(&mut target, source, path);
        if node.is_some() {
            path.pop();
        }
        merged?;

        Ok(repository.save(target)?)
    }

    fn merge_fields(
        &self,
        target: &mut Record,
        source: &Record,
        path: &mut Vec<(String, Uuid)>,
    ) -> FacadeResult<()> {
        let repository = self
            .registry
            .get(target.entity())
            .ok_or_else(|| FacadeError::UnmappedEntity(target.entity().to_string()))?;
        let descriptor = repository.descriptor();

        for field in descriptor.cascade_updatable_fields() {
            let Some(source_value) = source.get(&field.name) else {
                continue;
            };

            match field.relation() {
                RelationKind::ToMany => continue,
                RelationKind::None => {
                    target.set(field.name.clone(), source_value.clone());
                    continue;
                }
                RelationKind::ToOne => {}
            }

            let Some(source_related) = source_value.as_record() else {
                return Err(FacadeError::InvalidArgument(format!(
                    "field `{}.{}` expects a related record",
                    descriptor.name, field.name
                )));
            };
            let target_related = match target.related(&field.name) {
                Some(existing) => existing.clone(),
                None => {
                    self.default_instance(field.related_entity().unwrap_or(source_related.entity()))?
                }
            };
            let merged = self.merge_node(target_related, source_related, path)?;
            target.set(field.name.clone(), Value::from(merged));
        }

        Ok(())
    }

    fn default_instance(&self, entity: &str) -> FacadeResult<Record> {
        self.registry
            .get(entity)
            .map(|repository| repository.descriptor().default_instance())
            .ok_or_else(|| FacadeError::UnmappedEntity(entity.to_string()))
    }
}
