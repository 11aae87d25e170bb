//! Query synthesis from extracted field metadata.
//!
//! # Responsibility
//! - Build the free-text search predicate over searchable fields.
//! - Build equality and membership finders for scalar fields.
//! - Wrap declared custom queries into specs.
//!
//! # Invariants
//! - Output is a pure function of the inputs: same descriptor, same bytes.
//! - Fields appear in declaration order.
//! - An entity without searchable fields gets no free-text operation.

use crate::model::declaration::CustomQueryDeclaration;
use crate::model::descriptor::{EntityDescriptor, FieldDescriptor, QueryParam};
use crate::model::value::ParamType;
use crate::query::naming::{
    entity_alias, equality_finder_name, membership_finder_name, FREE_TEXT_OPERATION,
    SEARCH_TERM_PARAM,
};
use crate::query::spec::{QueryKind, QuerySpec};

/// Synthesizes every spec of one entity.
///
/// Order: free-text search, then per scalar field its equality and
/// membership finders, then custom queries.
pub fn synthesize(descriptor: &EntityDescriptor) -> Vec<QuerySpec> {
    let searchable: Vec<&FieldDescriptor> = descriptor.searchable_fields().collect();
    let mut specs = Vec::new();

    if let Some(spec) = free_text_search(&descriptor.name, &searchable) {
        specs.push(spec);
    }

    for field in descriptor.scalar_fields() {
        specs.extend(equality_finder(&descriptor.name, field));
        specs.extend(membership_finder(&descriptor.name, field));
    }

    specs.extend(
        descriptor
            .custom_queries
            .iter()
            .map(|query| custom_query(&descriptor.name, query)),
    );

    specs
}

/// Builds `freeTextSearch`: one case-insensitive containment clause per
/// field, the first unconditional and the rest `OR`-joined.
pub fn free_text_search(entity: &str, fields: &[&FieldDescriptor]) -> Option<QuerySpec> {
    if fields.is_empty() {
        return None;
    }

    let alias = entity_alias(entity);
    let mut predicate = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            predicate.push_str(" OR ");
        }
        predicate.push_str(&format!(
            "lower({alias}.\"{name}\") LIKE lower('%' || :{SEARCH_TERM_PARAM} || '%')",
            name = field.name
        ));
    }

    Some(QuerySpec {
        kind: QueryKind::FreeTextSearch,
        entity: entity.to_string(),
        fields: fields.iter().map(|field| field.name.clone()).collect(),
        operation: FREE_TEXT_OPERATION.to_string(),
        params: vec![QueryParam {
            name: SEARCH_TERM_PARAM.to_string(),
            param_type: ParamType::Text,
        }],
        predicate,
        pageable: true,
    })
}

/// Builds `findBy<Field>` for a scalar field.
pub fn equality_finder(entity: &str, field: &FieldDescriptor) -> Option<QuerySpec> {
    let param_type = field.field_type.param_type()?;
    let alias = entity_alias(entity);

    Some(QuerySpec {
        kind: QueryKind::EqualityFinder,
        entity: entity.to_string(),
        fields: vec![field.name.clone()],
        operation: equality_finder_name(&field.name),
        params: vec![QueryParam {
            name: field.name.clone(),
            param_type,
        }],
        predicate: format!("{alias}.\"{name}\" = :{name}", name = field.name),
        pageable: false,
    })
}

/// Builds `findAllBy<Field>In` for a scalar field.
///
/// The `(:name)` group is expanded to one placeholder per supplied value
/// when the operation is executed.
pub fn membership_finder(entity: &str, field: &FieldDescriptor) -> Option<QuerySpec> {
    field.field_type.param_type()?;
    let alias = entity_alias(entity);

    Some(QuerySpec {
        kind: QueryKind::MembershipFinder,
        entity: entity.to_string(),
        fields: vec![field.name.clone()],
        operation: membership_finder_name(&field.name),
        params: vec![QueryParam {
            name: field.name.clone(),
            param_type: ParamType::List,
        }],
        predicate: format!("{alias}.\"{name}\" IN (:{name})", name = field.name),
        pageable: false,
    })
}

pub fn custom_query(entity: &str, query: &CustomQueryDeclaration) -> QuerySpec {
    QuerySpec {
        kind: QueryKind::Custom,
        entity: entity.to_string(),
        fields: Vec::new(),
        operation: query.name.clone(),
        params: query.params.clone(),
        predicate: query.where_clause.trim().to_string(),
        pageable: false,
    }
}
