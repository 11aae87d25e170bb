//! Entity table provisioning from descriptors.
//!
//! # Responsibility
//! - Create one table per entity and one join table per to-many field.
//! - Record provisioned tables in the `entity_tables` bookkeeping table.
//!
//! # Invariants
//! - `CREATE TABLE IF NOT EXISTS` only; existing tables are left as they are.
//! - Column `id` is the text primary key of every entity table.
//! - To-one relations are stored as `<field>_id TEXT`.

use crate::db::DbResult;
use crate::model::descriptor::{EntityDescriptor, FieldDescriptor, FieldType};
use crate::model::value::ID_FIELD;
use convert_case::{Case, Casing};
use log::info;
use rusqlite::{params, Connection};
use std::time::{SystemTime, UNIX_EPOCH};

/// Join table of a to-many field: `<owner_table>_<field>`.
pub fn join_table_name(owner: &EntityDescriptor, field: &FieldDescriptor) -> String {
    format!("{}_{}", owner.table_name(), field.name.to_case(Case::Snake))
}

/// Creates missing entity and join tables inside one transaction.
pub fn ensure_entity_tables(
    conn: &mut Connection,
    descriptors: &[EntityDescriptor],
) -> DbResult<()> {
    let tx = conn.transaction()?;
    let created_at = now_epoch_secs();

    for descriptor in descriptors {
        tx.execute_batch(&create_table_sql(descriptor))?;
        for field in descriptor.to_many_fields() {
            tx.execute_batch(&create_join_table_sql(descriptor, field))?;
        }
        tx.execute(
            "INSERT INTO entity_tables (entity, table_name, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(entity) DO NOTHING;",
            params![descriptor.name, descriptor.table_name(), created_at],
        )?;
    }
    tx.commit()?;

    info!(
        "event=schema_ensure module=db status=ok entities={}",
        descriptors.len()
    );
    Ok(())
}

fn create_table_sql(descriptor: &EntityDescriptor) -> String {
    let mut columns = Vec::new();
    for field in &descriptor.fields {
        let Some(column) = field.column() else {
            continue;
        };
        if field.name == ID_FIELD {
            columns.push(format!("\"{column}\" TEXT PRIMARY KEY NOT NULL"));
        } else {
            columns.push(format!("\"{column}\" {}", column_type(&field.field_type)));
        }
    }

    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ({});",
        descriptor.table_name(),
        columns.join(", ")
    )
}

fn create_join_table_sql(owner: &EntityDescriptor, field: &FieldDescriptor) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (
            owner_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (owner_id, position)
        );",
        join_table_name(owner, field)
    )
}

fn column_type(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Integer | FieldType::Bool => "INTEGER",
        FieldType::Real => "REAL",
        FieldType::Text | FieldType::Uuid | FieldType::ToOne(_) | FieldType::ToMany(_) => "TEXT",
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::{ensure_entity_tables, join_table_name};
    use crate::db::open_db_in_memory;
    use crate::metadata::extractor::MetadataExtractor;
    use crate::model::declaration::{EntityDeclaration, FieldDeclaration};
    use crate::model::descriptor::EntityDescriptor;

    fn shelf() -> EntityDescriptor {
        let declaration = EntityDeclaration::new("BookShelf")
            .field(FieldDeclaration::text("label"))
            .field(FieldDeclaration::to_one("owner", "Reader"))
            .field(FieldDeclaration::to_many("books", "Book"));
        MetadataExtractor::new()
            .extract(&declaration)
            .expect("shelf should extract")
    }

    fn columns(conn: &rusqlite::Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info(\"{table}\");"))
            .expect("pragma should prepare");
        stmt.query_map([], |row| row.get::<_, String>(1))
            .expect("pragma should run")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows should decode")
    }

    #[test]
    fn creates_entity_and_join_tables() {
        let mut conn = open_db_in_memory().expect("db should open");
        let descriptor = shelf();
        ensure_entity_tables(&mut conn, std::slice::from_ref(&descriptor))
            .expect("tables should be created");

        assert_eq!(
            columns(&conn, "book_shelf"),
            vec!["id".to_string(), "label".to_string(), "owner_id".to_string()]
        );
        let join = join_table_name(&descriptor, descriptor.field("books").expect("books"));
        assert_eq!(join, "book_shelf_books");
        assert_eq!(
            columns(&conn, &join),
            vec![
                "owner_id".to_string(),
                "item_id".to_string(),
                "position".to_string()
            ]
        );
    }

    #[test]
    fn provisioning_is_idempotent() {
        let mut conn = open_db_in_memory().expect("db should open");
        let descriptors = vec![shelf()];
        ensure_entity_tables(&mut conn, &descriptors).expect("first run");
        ensure_entity_tables(&mut conn, &descriptors).expect("second run");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entity_tables;", [], |row| row.get(0))
            .expect("count should succeed");
        assert_eq!(count, 1);
    }
}
