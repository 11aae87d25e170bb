//! Field-level metadata extraction from entity declarations.
//!
//! # Responsibility
//! - Decide which fields are free-text searchable, cascade-updatable and
//!   relations.
//! - Normalize declarations into immutable `EntityDescriptor`s.
//!
//! # Invariants
//! - Only text fields are searchable. Other fields marked searchable are
//!   dropped from the searchable set with a warning.
//! - A rejected field or query never aborts extraction of the rest.
//! - No two fields of an entity share a finder name (PascalCase form) or a
//!   storage column (compared case-insensitively); the later one is dropped.
//! - Output field order is declaration order, with a synthesized `id` first
//!   when the declaration has none.

use crate::metadata::diagnostic::Diagnostic;
use crate::model::declaration::{CustomQueryDeclaration, EntityDeclaration};
use crate::model::descriptor::{
    is_identifier_name, EntityDescriptor, FieldDescriptor, FieldType, RelationKind,
};
use crate::model::value::{ParamType, ARCHIVED_FIELD, ID_FIELD};
use crate::query::naming::{
    equality_finder_name, is_reserved_operation_name, membership_finder_name, to_pascal_case,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("valid placeholder regex"));

/// Extracts descriptors and accumulates diagnostics across entities.
#[derive(Debug, Default)]
pub struct MetadataExtractor {
    diagnostics: Vec<Diagnostic>,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Builds the descriptor of one entity.
    ///
    /// Returns `None` when the entity itself is unusable (invalid name or an
    /// identifier of the wrong type); diagnostics explain why.
    pub fn extract(&mut self, declaration: &EntityDeclaration) -> Option<EntityDescriptor> {
        let entity = declaration.name.trim();
        if !IDENTIFIER_RE.is_match(entity) {
            self.report(Diagnostic::error(
                entity,
                None,
                "entity name is not a valid identifier",
            ));
            return None;
        }

        let mut fields = self.extract_fields(entity, declaration)?;

        if !fields.iter().any(|field| field.identifier) {
            fields.insert(0, identifier_field());
        }

        let archivable = declaration.archivable && self.ensure_archive_flag(entity, &mut fields);
        let custom_queries = self.extract_custom_queries(entity, &fields, &declaration.custom_queries);

        Some(EntityDescriptor {
            name: entity.to_string(),
            qualified_name: declaration
                .qualified_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| entity.to_string()),
            fields,
            archivable,
            custom_queries,
        })
    }

    /// Returns the searchable fields of a declaration in declaration order.
    ///
    /// A field qualifies when annotated individually or named in the
    /// class-level list; non-text candidates are reported and skipped.
    pub fn extract_searchable_fields(
        &mut self,
        declaration: &EntityDeclaration,
    ) -> Vec<FieldDescriptor> {
        self.extract(declaration)
            .map(|descriptor| descriptor.searchable_fields().cloned().collect())
            .unwrap_or_default()
    }

    fn extract_fields(
        &mut self,
        entity: &str,
        declaration: &EntityDeclaration,
    ) -> Option<Vec<FieldDescriptor>> {
        let class_level: BTreeSet<&str> = declaration
            .search_fields
            .iter()
            .map(|name| name.trim())
            .collect();
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(declaration.fields.len() + 1);

        // Fields added by extraction claim their keys up front.
        let mut implicit = vec![ID_FIELD];
        if declaration.archivable {
            implicit.push(ARCHIVED_FIELD);
        }
        let mut finder_keys: BTreeMap<String, String> = implicit
            .iter()
            .map(|name| (to_pascal_case(name), name.to_string()))
            .collect();
        let mut column_keys: BTreeMap<String, String> = implicit
            .iter()
            .map(|name| (name.to_lowercase(), name.to_string()))
            .collect();

        for field in &declaration.fields {
            let name = field.name.trim();
            if !IDENTIFIER_RE.is_match(name) {
                self.report(Diagnostic::error(
                    entity,
                    Some(name),
                    "field name is not a valid identifier; field dropped",
                ));
                continue;
            }
            if !seen.insert(name.to_string()) {
                self.report(Diagnostic::error(
                    entity,
                    Some(name),
                    "field declared more than once; later declaration dropped",
                ));
                continue;
            }

            let finder_key = to_pascal_case(name);
            let column_key = storage_column_key(name, &field.field_type);
            let clash = finder_keys
                .get(&finder_key)
                .or_else(|| column_key.as_ref().and_then(|key| column_keys.get(key)))
                .filter(|other| other.as_str() != name)
                .cloned();
            if let Some(other) = clash {
                self.report(Diagnostic::error(
                    entity,
                    Some(name),
                    format!(
                        "field collides with `{other}` in finder name or storage column; \
                         later declaration dropped"
                    ),
                ));
                continue;
            }
            finder_keys.insert(finder_key, name.to_string());
            if let Some(key) = column_key {
                column_keys.insert(key, name.to_string());
            }

            let identifier = is_identifier_name(name);
            if identifier && field.field_type != FieldType::Uuid {
                self.report(Diagnostic::error(
                    entity,
                    Some(name),
                    format!(
                        "identifier field must be of type uuid, found {}; entity rejected",
                        field.field_type.describe()
                    ),
                ));
                return None;
            }

            let marked_searchable = field.searchable || class_level.contains(name);
            let searchable = if marked_searchable && field.field_type != FieldType::Text {
                self.report(Diagnostic::warning(
                    entity,
                    Some(name),
                    format!(
                        "field of type {} is marked as free text search parameter but is not text",
                        field.field_type.describe()
                    ),
                ));
                false
            } else {
                marked_searchable
            };

            fields.push(FieldDescriptor {
                name: name.to_string(),
                field_type: field.field_type.clone(),
                nullable: field.nullable && !identifier,
                identifier,
                searchable,
                cascade_updatable: !identifier
                    && field.field_type.relation() != RelationKind::ToMany,
            });
        }

        for name in class_level {
            if !seen.contains(name) {
                self.report(Diagnostic::warning(
                    entity,
                    Some(name),
                    "class-level search field does not name a declared field",
                ));
            }
        }

        Some(fields)
    }

    fn ensure_archive_flag(&mut self, entity: &str, fields: &mut Vec<FieldDescriptor>) -> bool {
        match fields.iter().find(|field| field.name == ARCHIVED_FIELD) {
            Some(field) if field.field_type == FieldType::Bool => true,
            Some(field) => {
                self.report(Diagnostic::error(
                    entity,
                    Some(ARCHIVED_FIELD),
                    format!(
                        "archive flag must be bool, found {}; entity is not archivable",
                        field.field_type.describe()
                    ),
                ));
                false
            }
            None => {
                fields.push(FieldDescriptor {
                    name: ARCHIVED_FIELD.to_string(),
                    field_type: FieldType::Bool,
                    nullable: false,
                    identifier: false,
                    searchable: false,
                    cascade_updatable: true,
                });
                true
            }
        }
    }

    fn extract_custom_queries(
        &mut self,
        entity: &str,
        fields: &[FieldDescriptor],
        queries: &[CustomQueryDeclaration],
    ) -> Vec<CustomQueryDeclaration> {
        let synthesized: BTreeSet<String> = fields
            .iter()
            .filter(|field| field.is_scalar())
            .flat_map(|field| {
                [
                    equality_finder_name(&field.name),
                    membership_finder_name(&field.name),
                ]
            })
            .collect();
        let mut names = BTreeSet::new();
        let mut accepted = Vec::new();

        for query in queries {
            match check_custom_query(query, &synthesized) {
                Ok(()) if names.insert(query.name.clone()) => accepted.push(query.clone()),
                Ok(()) => self.report(Diagnostic::error(
                    entity,
                    None,
                    format!("custom query `{}` declared more than once", query.name),
                )),
                Err(reason) => self.report(Diagnostic::error(
                    entity,
                    None,
                    format!("custom query `{}` dropped: {reason}", query.name),
                )),
            }
        }

        accepted
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.push(diagnostic);
    }
}

fn identifier_field() -> FieldDescriptor {
    FieldDescriptor {
        name: ID_FIELD.to_string(),
        field_type: FieldType::Uuid,
        nullable: false,
        identifier: true,
        searchable: false,
        cascade_updatable: false,
    }
}

/// Lowercased storage column of a field; `None` for collections, which live
/// in join tables.
fn storage_column_key(name: &str, field_type: &FieldType) -> Option<String> {
    match field_type.relation() {
        RelationKind::None => Some(name.to_lowercase()),
        RelationKind::ToOne => Some(format!("{name}_id").to_lowercase()),
        RelationKind::ToMany => None,
    }
}

fn check_custom_query(
    query: &CustomQueryDeclaration,
    synthesized: &BTreeSet<String>,
) -> Result<(), String> {
    if !IDENTIFIER_RE.is_match(&query.name) {
        return Err("name is not a valid identifier".to_string());
    }
    if synthesized.contains(&query.name) || is_reserved_operation_name(&query.name) {
        return Err("name collides with a synthesized operation".to_string());
    }
    if query.where_clause.trim().is_empty() {
        return Err("where clause is empty".to_string());
    }

    let mut declared = BTreeSet::new();
    for param in &query.params {
        if !matches!(
            param.param_type,
            ParamType::Text | ParamType::Integer | ParamType::Real | ParamType::Bool | ParamType::Uuid
        ) {
            return Err(format!(
                "parameter `{}` has non-scalar type {}",
                param.name, param.param_type
            ));
        }
        if !declared.insert(param.name.as_str()) {
            return Err(format!("parameter `{}` declared more than once", param.name));
        }
    }

    let used: BTreeSet<&str> = PLACEHOLDER_RE
        .captures_iter(&query.where_clause)
        .filter_map(|captures| captures.get(1).map(|m| m.as_str()))
        .collect();
    if used != declared {
        return Err(format!(
            "placeholders {:?} do not match declared parameters {:?}",
            used, declared
        ));
    }

    Ok(())
}
