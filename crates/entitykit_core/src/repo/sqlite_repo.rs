//! SQLite-backed repositories over descriptor-driven tables.
//!
//! # Responsibility
//! - Persist and load dynamic records for every generated entity.
//! - Compile synthesized query specs into executable statements once.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `EntityDescriptor::validate_record` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Relations load eagerly; a node already on the load path comes back as an
//!   id-only stub.
//! - All repositories of one store share a single connection lock.

use crate::db::{ensure_entity_tables, join_table_name};
use crate::model::descriptor::{EntityDescriptor, FieldDescriptor, FieldType};
use crate::model::value::{ParamType, Record, Value, ARCHIVED_FIELD};
use crate::query::generate::SynthesisOutput;
use crate::query::spec::QuerySpec;
use crate::repo::repository::{
    Argument, CriterionOp, Direction, Page, PageRequest, RepoError, RepoResult, Repository,
    ResolvedOperation, Sort, Specification,
};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Params, ToSql};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Shared connection plus every descriptor and spec of one generated schema.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    descriptors: BTreeMap<String, Arc<EntityDescriptor>>,
    specs: BTreeMap<String, Vec<QuerySpec>>,
}

impl SqliteStore {
    /// Provisions entity tables on `conn` and wraps it into a shared store.
    pub fn open(mut conn: Connection, output: &SynthesisOutput) -> RepoResult<Arc<Self>> {
        ensure_entity_tables(&mut conn, &output.descriptors)?;

        let descriptors = output
            .descriptors
            .iter()
            .map(|descriptor| (descriptor.name.clone(), Arc::new(descriptor.clone())))
            .collect::<BTreeMap<_, _>>();

        info!(
            "event=store_open module=repo status=ok entities={}",
            descriptors.len()
        );
        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
            descriptors,
            specs: output.specs.clone(),
        }))
    }

    pub fn descriptor(&self, entity: &str) -> Option<Arc<EntityDescriptor>> {
        self.descriptors.get(entity).cloned()
    }

    /// Entity names in sorted order.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Builds the repository of one entity.
    pub fn repository(self: &Arc<Self>, entity: &str) -> Option<SqliteRepository> {
        let descriptor = self.descriptor(entity)?;
        let specs = self.specs.get(entity).map_or(&[][..], Vec::as_slice);
        Some(SqliteRepository::new(Arc::clone(self), descriptor, specs))
    }

    /// Builds one repository per entity, ready for registry discovery.
    pub fn repositories(self: &Arc<Self>) -> Vec<Arc<dyn Repository>> {
        self.entities()
            .filter_map(|entity| self.repository(entity))
            .map(|repository| Arc::new(repository) as Arc<dyn Repository>)
            .collect()
    }

    fn session<'a>(&'a self, conn: &'a Connection) -> Session<'a> {
        Session { conn, store: self }
    }
}

/// Repository of one entity backed by a [`SqliteStore`].
pub struct SqliteRepository {
    name: String,
    store: Arc<SqliteStore>,
    descriptor: Arc<EntityDescriptor>,
    operations: BTreeMap<String, Arc<ResolvedOperation>>,
}

impl SqliteRepository {
    pub fn new(store: Arc<SqliteStore>, descriptor: Arc<EntityDescriptor>, specs: &[QuerySpec]) -> Self {
        let select = select_sql(&descriptor);
        let operations = specs
            .iter()
            .map(|spec| {
                let operation = ResolvedOperation {
                    entity: descriptor.name.clone(),
                    operation: spec.operation.clone(),
                    signature: spec.signature(),
                    spec: spec.clone(),
                    sql: format!("{select} WHERE {}", spec.predicate),
                };
                (spec.operation.clone(), Arc::new(operation))
            })
            .collect();

        Self {
            name: descriptor.repository_name(),
            store,
            descriptor,
            operations,
        }
    }

    /// Overrides the declared handle name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn query_spec(
        &self,
        spec: &Specification,
        sort: Option<&Sort>,
        window: Option<&PageRequest>,
    ) -> RepoResult<Vec<Record>> {
        let (predicate, values) = where_clause(&self.descriptor, spec)?;
        let order = order_clause(&self.descriptor, sort)?;
        let mut sql = format!("{} WHERE {predicate} {order}", select_sql(&self.descriptor));
        if let Some(request) = window {
            sql.push_str(&limit_clause(request));
        }

        let conn = self.store.conn.lock();
        let session = self.store.session(&conn);
        session.query_records(&self.descriptor, &sql, params_from_iter(values))
    }

    fn count_spec(&self, spec: &Specification) -> RepoResult<u64> {
        let (predicate, values) = where_clause(&self.descriptor, spec)?;
        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\" AS {} WHERE {predicate}",
            self.descriptor.table_name(),
            self.descriptor.alias()
        );
        let conn = self.store.conn.lock();
        let count: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn delete_ids(&self, ids: &[Uuid]) -> RepoResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.store.conn.lock();
        let tx = conn.transaction()?;
        let deleted = self.store.session(&tx).delete_ids(&self.descriptor, ids)?;
        tx.commit()?;
        debug!(
            "event=repo_delete module=repo status=ok entity={} requested={} deleted={}",
            self.descriptor.name,
            ids.len(),
            deleted
        );
        Ok(())
    }
}

impl Repository for SqliteRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    fn find_all(&self, sort: Option<&Sort>) -> RepoResult<Vec<Record>> {
        self.query_spec(&Specification::new(), sort, None)
    }

    fn find_page(&self, request: &PageRequest) -> RepoResult<Page<Record>> {
        self.find_page_by_spec(&Specification::new(), request)
    }

    fn find_all_by_id(&self, ids: &[Uuid]) -> RepoResult<Vec<Record>> {
        let conn = self.store.conn.lock();
        let session = self.store.session(&conn);
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = session.load(&self.descriptor, *id, &mut Vec::new())? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Record>> {
        let conn = self.store.conn.lock();
        self.store
            .session(&conn)
            .load(&self.descriptor, id, &mut Vec::new())
    }

    fn exists_by_id(&self, id: Uuid) -> RepoResult<bool> {
        let conn = self.store.conn.lock();
        self.store.session(&conn).exists(&self.descriptor, id)
    }

    fn count(&self) -> RepoResult<u64> {
        self.count_spec(&Specification::new())
    }

    fn delete_by_id(&self, id: Uuid) -> RepoResult<()> {
        self.delete_ids(&[id])
    }

    fn delete(&self, record: &Record) -> RepoResult<()> {
        match record.id() {
            Some(id) => self.delete_ids(&[id]),
            None => Ok(()),
        }
    }

    fn delete_all(&self, records: &[Record]) -> RepoResult<()> {
        let ids: Vec<Uuid> = records.iter().filter_map(Record::id).collect();
        self.delete_ids(&ids)
    }

    fn delete_everything(&self) -> RepoResult<()> {
        let mut conn = self.store.conn.lock();
        let tx = conn.transaction()?;
        for field in self.descriptor.to_many_fields() {
            tx.execute(
                &format!("DELETE FROM \"{}\";", join_table_name(&self.descriptor, field)),
                [],
            )?;
        }
        let deleted = tx.execute(
            &format!("DELETE FROM \"{}\";", self.descriptor.table_name()),
            [],
        )?;
        tx.commit()?;
        debug!(
            "event=repo_delete_all module=repo status=ok entity={} deleted={}",
            self.descriptor.name, deleted
        );
        Ok(())
    }

    fn delete_in_batch(&self, records: &[Record]) -> RepoResult<()> {
        self.delete_all(records)
    }

    fn delete_all_in_batch(&self) -> RepoResult<()> {
        self.delete_everything()
    }

    fn save(&self, record: Record) -> RepoResult<Record> {
        let mut saved = self.save_all(vec![record])?;
        saved.pop().ok_or_else(|| {
            RepoError::InvalidData(format!("save of {} returned no record", self.descriptor.name))
        })
    }

    fn save_all(&self, records: Vec<Record>) -> RepoResult<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.store.conn.lock();
        let tx = conn.transaction()?;
        let session = self.store.session(&tx);
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(session.save(&self.descriptor, record)?);
        }

        let mut saved = Vec::with_capacity(ids.len());
        for id in &ids {
            let record = session
                .load(&self.descriptor, *id, &mut Vec::new())?
                .ok_or_else(|| RepoError::NotFound {
                    entity: self.descriptor.name.clone(),
                    id: *id,
                })?;
            saved.push(record);
        }
        tx.commit()?;

        debug!(
            "event=repo_save module=repo status=ok entity={} count={}",
            self.descriptor.name,
            saved.len()
        );
        Ok(saved)
    }

    fn flush(&self) -> RepoResult<()> {
        // Every save commits its own transaction.
        Ok(())
    }

    fn find_by_spec(&self, spec: &Specification, sort: Option<&Sort>) -> RepoResult<Vec<Record>> {
        self.query_spec(spec, sort, None)
    }

    fn find_page_by_spec(
        &self,
        spec: &Specification,
        request: &PageRequest,
    ) -> RepoResult<Page<Record>> {
        let total_elements = self.count_spec(spec)?;
        let content = self.query_spec(spec, request.sort.as_ref(), Some(request))?;
        Ok(Page {
            content,
            page: request.page,
            size: request.size,
            total_elements,
        })
    }

    fn count_by_spec(&self, spec: &Specification) -> RepoResult<u64> {
        self.count_spec(spec)
    }

    fn operation(&self, name: &str, signature: &[ParamType]) -> Option<Arc<ResolvedOperation>> {
        self.operations
            .get(name)
            .filter(|operation| operation.signature == signature)
            .cloned()
    }

    fn execute(
        &self,
        operation: &ResolvedOperation,
        args: &[Argument],
        page: Option<&PageRequest>,
    ) -> RepoResult<Vec<Record>> {
        let spec = &operation.spec;
        if args.len() != spec.params.len() {
            return Err(RepoError::InvalidArguments {
                operation: operation.operation.clone(),
                message: format!("expected {} arguments, got {}", spec.params.len(), args.len()),
            });
        }

        let mut sql = operation.sql.clone();
        let mut bindings: Vec<(String, SqlValue)> = Vec::new();
        for (param, arg) in spec.params.iter().zip(args) {
            match (param.param_type, arg) {
                (ParamType::List, Argument::Many(values)) => {
                    if values.is_empty() {
                        return Ok(Vec::new());
                    }
                    let names: Vec<String> = (0..values.len())
                        .map(|index| format!(":{}_{index}", param.name))
                        .collect();
                    sql = sql.replace(&format!("(:{})", param.name), &format!("({})", names.join(", ")));
                    for (name, value) in names.into_iter().zip(values) {
                        bindings.push((name, argument_value(&operation.operation, value)?));
                    }
                }
                (ParamType::List, Argument::One(_)) | (_, Argument::Many(_)) => {
                    return Err(RepoError::InvalidArguments {
                        operation: operation.operation.clone(),
                        message: format!("argument shape does not match parameter `{}`", param.name),
                    });
                }
                (_, Argument::One(value)) => {
                    bindings.push((
                        format!(":{}", param.name),
                        argument_value(&operation.operation, value)?,
                    ));
                }
            }
        }

        let window = page.filter(|_| spec.pageable);
        sql.push(' ');
        sql.push_str(&order_clause(
            &self.descriptor,
            window.and_then(|request| request.sort.as_ref()),
        )?);
        if let Some(request) = window {
            sql.push_str(&limit_clause(request));
        }

        let named: Vec<(&str, &dyn ToSql)> = bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();
        let conn = self.store.conn.lock();
        let records = self
            .store
            .session(&conn)
            .query_records(&self.descriptor, &sql, named.as_slice())?;

        debug!(
            "event=repo_execute module=repo status=ok entity={} operation={} rows={}",
            self.descriptor.name,
            operation.operation,
            records.len()
        );
        Ok(records)
    }
}

/// Connection-scoped helpers shared by reads and writes.
struct Session<'a> {
    conn: &'a Connection,
    store: &'a SqliteStore,
}

type LoadPath = Vec<(String, Uuid)>;

impl Session<'_> {
    fn descriptor(&self, entity: &str) -> RepoResult<Arc<EntityDescriptor>> {
        self.store
            .descriptor(entity)
            .ok_or_else(|| RepoError::InvalidData(format!("unknown related entity `{entity}`")))
    }

    fn exists(&self, descriptor: &EntityDescriptor, id: Uuid) -> RepoResult<bool> {
        let found: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE id = ?1);",
                descriptor.table_name()
            ),
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(found == 1)
    }

    fn query_records<P: Params>(
        &self,
        descriptor: &EntityDescriptor,
        sql: &str,
        params: P,
    ) -> RepoResult<Vec<Record>> {
        let rows = self.fetch_rows(sql, params, column_count(descriptor))?;
        rows.into_iter()
            .map(|row| self.decode(descriptor, row, &mut Vec::new()))
            .collect()
    }

    fn fetch_rows<P: Params>(
        &self,
        sql: &str,
        params: P,
        width: usize,
    ) -> RepoResult<Vec<Vec<SqlValue>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(row.get::<_, SqlValue>(index)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn load(
        &self,
        descriptor: &EntityDescriptor,
        id: Uuid,
        path: &mut LoadPath,
    ) -> RepoResult<Option<Record>> {
        let sql = format!(
            "{} WHERE {}.id = ?1;",
            select_sql(descriptor),
            descriptor.alias()
        );
        let mut rows = self.fetch_rows(&sql, [id.to_string()], column_count(descriptor))?;
        match rows.pop() {
            Some(row) => Ok(Some(self.decode(descriptor, row, path)?)),
            None => Ok(None),
        }
    }

    fn decode(
        &self,
        descriptor: &EntityDescriptor,
        row: Vec<SqlValue>,
        path: &mut LoadPath,
    ) -> RepoResult<Record> {
        let mut record = Record::new(descriptor.name.clone());
        let columns = descriptor.fields.iter().filter(|field| field.column().is_some());
        for (field, value) in columns.zip(row) {
            let decoded = decode_column(descriptor, field, value)?;
            record.set(field.name.clone(), decoded);
        }

        let Some(id) = record.id() else {
            return Err(RepoError::InvalidData(format!(
                "{}.id is missing",
                descriptor.table_name()
            )));
        };

        path.push((descriptor.name.clone(), id));
        let resolved = self.resolve_relations(descriptor, &mut record, id, path);
        path.pop();
        resolved?;

        Ok(record)
    }

    fn resolve_relations(
        &self,
        descriptor: &EntityDescriptor,
        record: &mut Record,
        id: Uuid,
        path: &mut LoadPath,
    ) -> RepoResult<()> {
        for field in descriptor.to_one_fields() {
            let Some(target) = field.related_entity() else {
                continue;
            };
            let Some(related_id) = record.get(&field.name).and_then(Value::as_uuid) else {
                continue;
            };
            let related = self.load_related(target, related_id, path)?;
            record.set(field.name.clone(), related);
        }

        for field in descriptor.to_many_fields() {
            let Some(target) = field.related_entity() else {
                continue;
            };
            let item_ids = self.collection_ids(descriptor, field, id)?;
            let mut items = Vec::with_capacity(item_ids.len());
            for item_id in item_ids {
                if let Value::Entity(item) = self.load_related(target, item_id, path)? {
                    items.push(*item);
                }
            }
            record.set(field.name.clone(), Value::List(items));
        }

        Ok(())
    }

    fn load_related(&self, entity: &str, id: Uuid, path: &mut LoadPath) -> RepoResult<Value> {
        if path
            .iter()
            .any(|(seen_entity, seen_id)| seen_entity == entity && *seen_id == id)
        {
            let mut stub = Record::new(entity);
            stub.set_id(id);
            return Ok(Value::from(stub));
        }
        let descriptor = self.descriptor(entity)?;
        Ok(self
            .load(&descriptor, id, path)?
            .map_or(Value::Null, Value::from))
    }

    fn collection_ids(
        &self,
        owner: &EntityDescriptor,
        field: &FieldDescriptor,
        owner_id: Uuid,
    ) -> RepoResult<Vec<Uuid>> {
        let sql = format!(
            "SELECT item_id FROM \"{}\" WHERE owner_id = ?1 ORDER BY position ASC;",
            join_table_name(owner, field)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([owner_id.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            ids.push(parse_uuid(&text, owner, &field.name)?);
        }
        Ok(ids)
    }

    /// Inserts or partially updates one record and returns its id.
    fn save(&self, descriptor: &EntityDescriptor, mut record: Record) -> RepoResult<Uuid> {
        let existing = match record.id() {
            Some(id) => self.exists(descriptor, id)?,
            None => false,
        };
        if !existing && descriptor.archivable && record.is_absent(ARCHIVED_FIELD) {
            record.set(ARCHIVED_FIELD, false);
        }
        descriptor.validate_record(&record, !existing)?;

        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                record.set_id(id);
                id
            }
        };

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in descriptor.fields.iter().filter(|field| !field.identifier) {
            let (Some(column), Some(value)) = (field.column(), record.raw(&field.name)) else {
                continue;
            };
            columns.push(column);
            values.push(column_value(descriptor, field, value)?);
        }

        let table = descriptor.table_name();
        if existing {
            if !columns.is_empty() {
                let assignments: Vec<String> = columns
                    .iter()
                    .map(|column| format!("\"{column}\" = ?"))
                    .collect();
                values.push(SqlValue::Text(id.to_string()));
                self.conn.execute(
                    &format!(
                        "UPDATE \"{table}\" SET {} WHERE id = ?;",
                        assignments.join(", ")
                    ),
                    params_from_iter(values),
                )?;
            }
        } else {
            let mut names = vec!["\"id\"".to_string()];
            names.extend(columns.iter().map(|column| format!("\"{column}\"")));
            let placeholders = vec!["?"; names.len()].join(", ");
            let mut bound = vec![SqlValue::Text(id.to_string())];
            bound.extend(values);
            self.conn.execute(
                &format!(
                    "INSERT INTO \"{table}\" ({}) VALUES ({placeholders});",
                    names.join(", ")
                ),
                params_from_iter(bound),
            )?;
        }

        for field in descriptor.to_many_fields() {
            if let Some(Value::List(items)) = record.raw(&field.name) {
                self.replace_collection(descriptor, field, id, items)?;
            }
        }

        Ok(id)
    }

    fn replace_collection(
        &self,
        owner: &EntityDescriptor,
        field: &FieldDescriptor,
        owner_id: Uuid,
        items: &[Record],
    ) -> RepoResult<()> {
        let table = join_table_name(owner, field);
        self.conn.execute(
            &format!("DELETE FROM \"{table}\" WHERE owner_id = ?1;"),
            [owner_id.to_string()],
        )?;
        for (position, item) in items.iter().enumerate() {
            let item_id = item.id().ok_or_else(|| RepoError::UnsavedRelation {
                entity: owner.name.clone(),
                field: field.name.clone(),
            })?;
            self.conn.execute(
                &format!("INSERT INTO \"{table}\" (owner_id, item_id, position) VALUES (?1, ?2, ?3);"),
                params![owner_id.to_string(), item_id.to_string(), position as i64],
            )?;
        }
        Ok(())
    }

    fn delete_ids(&self, descriptor: &EntityDescriptor, ids: &[Uuid]) -> RepoResult<usize> {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let bound: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        for field in descriptor.to_many_fields() {
            self.conn.execute(
                &format!(
                    "DELETE FROM \"{}\" WHERE owner_id IN ({placeholders});",
                    join_table_name(descriptor, field)
                ),
                params_from_iter(bound.iter()),
            )?;
        }
        let deleted = self.conn.execute(
            &format!(
                "DELETE FROM \"{}\" WHERE id IN ({placeholders});",
                descriptor.table_name()
            ),
            params_from_iter(bound.iter()),
        )?;
        Ok(deleted)
    }
}

fn column_count(descriptor: &EntityDescriptor) -> usize {
    descriptor
        .fields
        .iter()
        .filter(|field| field.column().is_some())
        .count()
}

fn select_sql(descriptor: &EntityDescriptor) -> String {
    let alias = descriptor.alias();
    let columns: Vec<String> = descriptor
        .fields
        .iter()
        .filter_map(FieldDescriptor::column)
        .map(|column| format!("{alias}.\"{column}\""))
        .collect();
    format!(
        "SELECT {} FROM \"{}\" AS {alias}",
        columns.join(", "),
        descriptor.table_name()
    )
}

fn order_clause(descriptor: &EntityDescriptor, sort: Option<&Sort>) -> RepoResult<String> {
    let alias = descriptor.alias();
    let Some(sort) = sort else {
        return Ok(format!("ORDER BY {alias}.rowid ASC"));
    };
    let field = descriptor
        .field(&sort.field)
        .filter(|field| field.is_scalar())
        .ok_or_else(|| RepoError::UnknownField {
            entity: descriptor.name.clone(),
            field: sort.field.clone(),
        })?;
    let direction = match sort.direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    Ok(format!(
        "ORDER BY {alias}.\"{}\" {direction}, {alias}.rowid ASC",
        field.name
    ))
}

fn limit_clause(request: &PageRequest) -> String {
    format!(" LIMIT {} OFFSET {}", request.size, request.offset())
}

fn where_clause(
    descriptor: &EntityDescriptor,
    spec: &Specification,
) -> RepoResult<(String, Vec<SqlValue>)> {
    let alias = descriptor.alias();
    let mut clauses = Vec::with_capacity(spec.criteria.len());
    let mut values = Vec::new();

    for criterion in &spec.criteria {
        let field = descriptor.field(&criterion.field);
        let (Some(field), Some(column)) = (field, field.and_then(FieldDescriptor::column)) else {
            return Err(RepoError::UnknownField {
                entity: descriptor.name.clone(),
                field: criterion.field.clone(),
            });
        };
        let column = format!("{alias}.\"{column}\"");
        let comparison = match criterion.op {
            CriterionOp::Eq if criterion.value.is_null() => {
                clauses.push(format!("{column} IS NULL"));
                continue;
            }
            CriterionOp::NotEq if criterion.value.is_null() => {
                clauses.push(format!("{column} IS NOT NULL"));
                continue;
            }
            CriterionOp::IsNull => {
                clauses.push(format!("{column} IS NULL"));
                continue;
            }
            CriterionOp::IsNotNull => {
                clauses.push(format!("{column} IS NOT NULL"));
                continue;
            }
            CriterionOp::Contains => {
                if criterion.value.as_text().is_none() {
                    return Err(RepoError::InvalidArguments {
                        operation: "contains".to_string(),
                        message: format!("`{}` needs a text value", criterion.field),
                    });
                }
                clauses.push(format!("lower({column}) LIKE lower('%' || ? || '%')"));
                values.push(column_value(descriptor, field, &criterion.value)?);
                continue;
            }
            CriterionOp::Eq => "=",
            CriterionOp::NotEq => "<>",
            CriterionOp::Lt => "<",
            CriterionOp::Le => "<=",
            CriterionOp::Gt => ">",
            CriterionOp::Ge => ">=",
        };
        if criterion.value.is_null() {
            return Err(RepoError::InvalidArguments {
                operation: format!("{:?}", criterion.op).to_lowercase(),
                message: format!("`{}` cannot be compared with null", criterion.field),
            });
        }
        clauses.push(format!("{column} {comparison} ?"));
        values.push(column_value(descriptor, field, &criterion.value)?);
    }

    if clauses.is_empty() {
        return Ok(("1 = 1".to_string(), values));
    }
    Ok((clauses.join(" AND "), values))
}

fn column_value(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    value: &Value,
) -> RepoResult<SqlValue> {
    match value {
        Value::Entity(record) => record
            .id()
            .map(|id| SqlValue::Text(id.to_string()))
            .ok_or_else(|| RepoError::UnsavedRelation {
                entity: descriptor.name.clone(),
                field: field.name.clone(),
            }),
        Value::List(_) => Err(RepoError::InvalidArguments {
            operation: "bind".to_string(),
            message: format!("`{}.{}` cannot hold a list", descriptor.name, field.name),
        }),
        scalar => Ok(scalar_value(scalar)),
    }
}

fn argument_value(operation: &str, value: &Value) -> RepoResult<SqlValue> {
    match value {
        Value::Entity(record) => record
            .id()
            .map(|id| SqlValue::Text(id.to_string()))
            .ok_or_else(|| RepoError::InvalidArguments {
                operation: operation.to_string(),
                message: "related record argument has no id".to_string(),
            }),
        Value::List(_) => Err(RepoError::InvalidArguments {
            operation: operation.to_string(),
            message: "nested lists are not supported".to_string(),
        }),
        scalar => Ok(scalar_value(scalar)),
    }
}

fn scalar_value(value: &Value) -> SqlValue {
    match value {
        Value::Text(text) => SqlValue::Text(text.clone()),
        Value::Integer(number) => SqlValue::Integer(*number),
        Value::Real(number) => SqlValue::Real(*number),
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Uuid(id) => SqlValue::Text(id.to_string()),
        Value::Null | Value::Entity(_) | Value::List(_) => SqlValue::Null,
    }
}

fn decode_column(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    value: SqlValue,
) -> RepoResult<Value> {
    let decoded = match (&field.field_type, value) {
        (_, SqlValue::Null) => Value::Null,
        (FieldType::Text, SqlValue::Text(text)) => Value::Text(text),
        (FieldType::Integer, SqlValue::Integer(number)) => Value::Integer(number),
        (FieldType::Real, SqlValue::Real(number)) => Value::Real(number),
        (FieldType::Real, SqlValue::Integer(number)) => Value::Real(number as f64),
        (FieldType::Bool, SqlValue::Integer(0)) => Value::Bool(false),
        (FieldType::Bool, SqlValue::Integer(1)) => Value::Bool(true),
        (FieldType::Uuid | FieldType::ToOne(_), SqlValue::Text(text)) => {
            Value::Uuid(parse_uuid(&text, descriptor, &field.name)?)
        }
        (field_type, other) => {
            return Err(RepoError::InvalidData(format!(
                "value {other:?} in {}.{} is not a {}",
                descriptor.table_name(),
                field.name,
                field_type.describe()
            )));
        }
    };
    Ok(decoded)
}

fn parse_uuid(text: &str, descriptor: &EntityDescriptor, field: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{text}` in {}.{field}",
            descriptor.table_name()
        ))
    })
}
