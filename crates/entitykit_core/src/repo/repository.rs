//! Generic repository contract shared by every entity type.
//!
//! # Responsibility
//! - Define the per-entity access point the registry and facade dispatch to.
//! - Define paging, sorting, example and specification query inputs.
//! - Carry resolved, executable operations handed out to the resolver cache.
//!
//! # Invariants
//! - Write paths validate records against the entity descriptor first.
//! - `operation` returns the same `Arc` for the same name on every call.
//! - Repositories are `Send + Sync` and shared across threads.

use crate::db::DbError;
use crate::model::descriptor::{EntityDescriptor, RecordValidationError, RelationKind};
use crate::model::value::{ParamType, Record, Value};
use crate::query::spec::QuerySpec;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound { entity: String, id: Uuid },
    InvalidData(String),
    UnknownField { entity: String, field: String },
    /// A related record referenced by a save has no id yet.
    UnsavedRelation { entity: String, field: String },
    InvalidArguments { operation: String, message: String },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UnknownField { entity, field } => {
                write!(f, "entity `{entity}` has no queryable field `{field}`")
            }
            Self::UnsavedRelation { entity, field } => write!(
                f,
                "field `{entity}.{field}` references a record that has not been saved"
            ),
            Self::InvalidArguments { operation, message } => {
                write!(f, "invalid arguments for `{operation}`: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Ordering by one scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Zero-based page window with optional ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Option<Sort>,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: None,
        }
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Row offset of the first element of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size))
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// Case-insensitive substring match on text fields.
    Contains,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub op: CriterionOp,
    pub value: Value,
}

/// Conjunction of field criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub criteria: Vec<Criterion>,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, op: CriterionOp, value: impl Into<Value>) -> Self {
        self.criteria.push(Criterion {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::Eq, value)
    }

    pub fn not_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::NotEq, value)
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::Lt, value)
    }

    pub fn le(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::Le, value)
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::Gt, value)
    }

    pub fn ge(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::Ge, value)
    }

    pub fn contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, CriterionOp::Contains, value)
    }

    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.with(field, CriterionOp::IsNull, Value::Null)
    }

    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.with(field, CriterionOp::IsNotNull, Value::Null)
    }

    /// Equality criteria for every present scalar or to-one field of `probe`.
    ///
    /// Collections and absent values do not constrain the match.
    pub fn from_example(descriptor: &EntityDescriptor, probe: &Record) -> Self {
        let criteria = descriptor
            .fields
            .iter()
            .filter(|field| field.relation() != RelationKind::ToMany)
            .filter_map(|field| {
                probe.get(&field.name).map(|value| Criterion {
                    field: field.name.clone(),
                    op: CriterionOp::Eq,
                    value: value.clone(),
                })
            })
            .collect();
        Self { criteria }
    }
}

/// Positional argument of a resolved operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    One(Value),
    /// Value set of a membership finder.
    Many(Vec<Value>),
}

impl Argument {
    /// Signature tag of this argument, `None` for a null value.
    pub fn param_type(&self) -> Option<ParamType> {
        match self {
            Self::One(value) => value.param_type(),
            Self::Many(_) => Some(ParamType::List),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self::One(value)
    }
}

impl From<Vec<Value>> for Argument {
    fn from(values: Vec<Value>) -> Self {
        Self::Many(values)
    }
}

/// Executable handle for one synthesized or custom operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperation {
    pub entity: String,
    pub operation: String,
    pub signature: Vec<ParamType>,
    pub spec: QuerySpec,
    /// Compiled select statement without ordering or paging.
    pub sql: String,
}

/// Per-entity access point.
///
/// Example queries default to specification queries built with
/// [`Specification::from_example`].
pub trait Repository: Send + Sync {
    /// Declared handle name, `<Entity>Repository` by convention.
    fn name(&self) -> &str;
    fn descriptor(&self) -> &EntityDescriptor;

    fn find_all(&self, sort: Option<&Sort>) -> RepoResult<Vec<Record>>;
    fn find_page(&self, request: &PageRequest) -> RepoResult<Page<Record>>;
    fn find_all_by_id(&self, ids: &[Uuid]) -> RepoResult<Vec<Record>>;
    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Record>>;
    fn exists_by_id(&self, id: Uuid) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<u64>;

    fn delete_by_id(&self, id: Uuid) -> RepoResult<()>;
    fn delete(&self, record: &Record) -> RepoResult<()>;
    fn delete_all(&self, records: &[Record]) -> RepoResult<()>;
    /// Deletes every row of the entity.
    fn delete_everything(&self) -> RepoResult<()>;
    fn delete_in_batch(&self, records: &[Record]) -> RepoResult<()>;
    fn delete_all_in_batch(&self) -> RepoResult<()>;

    /// Inserts or updates and returns the persisted state.
    fn save(&self, record: Record) -> RepoResult<Record>;
    fn save_all(&self, records: Vec<Record>) -> RepoResult<Vec<Record>>;
    fn flush(&self) -> RepoResult<()>;

    fn save_and_flush(&self, record: Record) -> RepoResult<Record> {
        let saved = self.save(record)?;
        self.flush()?;
        Ok(saved)
    }

    /// Returns the record or `NotFound`.
    fn get_one(&self, id: Uuid) -> RepoResult<Record> {
        self.find_by_id(id)?.ok_or_else(|| RepoError::NotFound {
            entity: self.descriptor().name.clone(),
            id,
        })
    }

    fn find_by_spec(&self, spec: &Specification, sort: Option<&Sort>) -> RepoResult<Vec<Record>>;
    fn find_page_by_spec(
        &self,
        spec: &Specification,
        request: &PageRequest,
    ) -> RepoResult<Page<Record>>;
    fn count_by_spec(&self, spec: &Specification) -> RepoResult<u64>;

    fn find_by_example(&self, probe: &Record, sort: Option<&Sort>) -> RepoResult<Vec<Record>> {
        self.find_by_spec(&Specification::from_example(self.descriptor(), probe), sort)
    }

    fn find_page_by_example(
        &self,
        probe: &Record,
        request: &PageRequest,
    ) -> RepoResult<Page<Record>> {
        self.find_page_by_spec(&Specification::from_example(self.descriptor(), probe), request)
    }

    fn count_by_example(&self, probe: &Record) -> RepoResult<u64> {
        self.count_by_spec(&Specification::from_example(self.descriptor(), probe))
    }

    /// Looks up an operation by name and exact parameter signature.
    fn operation(&self, name: &str, signature: &[ParamType]) -> Option<Arc<ResolvedOperation>>;

    /// Runs a resolved operation. `page` applies to pageable operations only.
    fn execute(
        &self,
        operation: &ResolvedOperation,
        args: &[Argument],
        page: Option<&PageRequest>,
    ) -> RepoResult<Vec<Record>>;
}

#[cfg(test)]
mod tests {
    use super::{CriterionOp, Page, PageRequest, Specification};
    use crate::model::descriptor::{EntityDescriptor, FieldDescriptor, FieldType};
    use crate::model::value::{Record, Value};

    fn field(name: &str, field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            field_type,
            nullable: true,
            identifier: name == "id",
            searchable: false,
            cascade_updatable: name != "id",
        }
    }

    #[test]
    fn example_ignores_absent_values_and_collections() {
        let descriptor = EntityDescriptor {
            name: "Book".to_string(),
            qualified_name: "Book".to_string(),
            fields: vec![
                field("id", FieldType::Uuid),
                field("title", FieldType::Text),
                field("pages", FieldType::Integer),
                field("tags", FieldType::ToMany("Tag".to_string())),
            ],
            archivable: false,
            custom_queries: Vec::new(),
        };
        let probe = Record::new("Book")
            .with("title", "Dune")
            .with("pages", Value::Null)
            .with("tags", vec![Record::new("Tag")]);

        let spec = Specification::from_example(&descriptor, &probe);
        assert_eq!(spec.criteria.len(), 1);
        assert_eq!(spec.criteria[0].field, "title");
        assert_eq!(spec.criteria[0].op, CriterionOp::Eq);
    }

    #[test]
    fn page_math() {
        assert_eq!(PageRequest::new(3, 20).offset(), 60);
        let page: Page<u8> = Page {
            content: vec![1, 2],
            page: 0,
            size: 2,
            total_elements: 5,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
