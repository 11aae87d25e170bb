mod common;

use common::library_schema;
use entitykit_core::{generate, ParamType, QueryKind, SchemaDeclaration, Severity};

const SCHEMA: &str = r#"{
    "entities": [
        {
            "name": "Book",
            "qualified_name": "library.Book",
            "archivable": true,
            "search_fields": ["title", "summary"],
            "fields": [
                {"name": "title", "type": "text", "nullable": false},
                {"name": "pages", "type": "integer", "searchable": true},
                {"name": "author", "type": {"to_one": "Author"}},
                {"name": "publisher", "type": {"to_one": "Publisher"}}
            ],
            "custom_queries": [{
                "name": "longerThan",
                "where_clause": "b.pages > :minPages",
                "params": [{"name": "minPages", "type": "integer"}]
            }]
        },
        {
            "name": "Author",
            "fields": [{"name": "name", "type": "text"}]
        }
    ]
}"#;

#[test]
fn json_schema_produces_descriptors_specs_and_bindings() {
    let schema: SchemaDeclaration = serde_json::from_str(SCHEMA).unwrap();
    let output = generate(&schema.entities);

    let book = output.descriptor("Book").unwrap();
    assert!(book.archivable);
    assert!(book.field("id").unwrap().identifier);
    assert!(book.field("is_archived").is_some());
    assert!(book.field("title").unwrap().searchable);
    assert!(!book.field("pages").unwrap().searchable);
    assert!(book.field("publisher").is_none());

    let operations: Vec<&str> = output
        .specs_for("Book")
        .iter()
        .map(|spec| spec.operation.as_str())
        .collect();
    assert!(operations.contains(&"freeTextSearch"));
    assert!(operations.contains(&"findByTitle"));
    assert!(operations.contains(&"findAllByTitleIn"));
    assert!(operations.contains(&"findByPages"));
    assert!(operations.contains(&"longerThan"));
    assert!(!operations.contains(&"findByAuthor"));

    let custom = output
        .specs_for("Book")
        .iter()
        .find(|spec| spec.operation == "longerThan")
        .unwrap();
    assert_eq!(custom.kind, QueryKind::Custom);
    assert_eq!(custom.params[0].param_type, ParamType::Integer);

    let repositories: Vec<&str> = output
        .bindings
        .iter()
        .map(|binding| binding.repository.as_str())
        .collect();
    assert_eq!(repositories, vec!["AuthorRepository", "BookRepository"]);
}

#[test]
fn diagnostics_separate_warnings_from_errors() {
    let schema: SchemaDeclaration = serde_json::from_str(SCHEMA).unwrap();
    let output = generate(&schema.entities);

    let warnings: Vec<Option<&str>> = output
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Warning)
        .map(|diagnostic| diagnostic.field.as_deref())
        .collect();
    assert!(warnings.contains(&Some("pages")));
    assert!(warnings.contains(&Some("summary")));

    let errors: Vec<Option<&str>> = output
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == Severity::Error)
        .map(|diagnostic| diagnostic.field.as_deref())
        .collect();
    assert_eq!(errors, vec![Some("publisher")]);
    assert!(output.has_errors());
}

#[test]
fn clean_schema_has_no_errors() {
    let output = generate(&library_schema());
    assert!(!output.has_errors());
    assert_eq!(output.descriptors.len(), 5);
}

#[test]
fn output_serialization_is_deterministic() {
    let mut reversed = library_schema();
    reversed.reverse();

    let forward = serde_json::to_string(&generate(&library_schema())).unwrap();
    let backward = serde_json::to_string(&generate(&reversed)).unwrap();
    assert_eq!(forward, backward);

    let parsed: serde_json::Value = serde_json::from_str(&forward).unwrap();
    assert!(parsed["specs"]["Book"].is_array());
    assert_eq!(parsed["bindings"][0]["entity"], "Agent");
}
