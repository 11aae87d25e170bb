#![allow(dead_code)]

use entitykit_core::{
    generate, open_db_in_memory, CustomQueryDeclaration, DispatchFacade, EntityDeclaration,
    FacadeConfig, FieldDeclaration, ParamType, Record, RepositoryRegistry, SqliteStore,
    SynthesisOutput,
};
use std::sync::Arc;

pub fn library_schema() -> Vec<EntityDeclaration> {
    vec![
        EntityDeclaration::new("Author")
            .qualified("library.Author")
            .field(FieldDeclaration::text("name").searchable())
            .field(FieldDeclaration::text("bio"))
            .field(FieldDeclaration::to_one("agent", "Agent")),
        EntityDeclaration::new("Agent")
            .field(FieldDeclaration::text("name"))
            .field(FieldDeclaration::text("phone")),
        EntityDeclaration::new("Book")
            .qualified("library.Book")
            .field(FieldDeclaration::text("title").required())
            .field(FieldDeclaration::text("description"))
            .field(FieldDeclaration::integer("pages"))
            .field(FieldDeclaration::text("isbn"))
            .field(FieldDeclaration::to_one("author", "Author"))
            .field(FieldDeclaration::to_many("tags", "Tag"))
            .search_by(["title", "description"])
            .archivable()
            .custom_query(
                CustomQueryDeclaration::new("longerThan", "b.pages > :minPages")
                    .param("minPages", ParamType::Integer),
            ),
        EntityDeclaration::new("Tag").field(FieldDeclaration::text("label")),
        EntityDeclaration::new("Person")
            .field(FieldDeclaration::text("name"))
            .field(FieldDeclaration::to_one("friend", "Person")),
    ]
}

pub fn library_output() -> SynthesisOutput {
    let output = generate(&library_schema());
    assert!(!output.has_errors(), "{:?}", output.diagnostics);
    output
}

pub fn library_store() -> Arc<SqliteStore> {
    SqliteStore::open(open_db_in_memory().unwrap(), &library_output()).unwrap()
}

pub fn facade_over(store: &Arc<SqliteStore>) -> DispatchFacade {
    facade_with_config(store, FacadeConfig::default())
}

pub fn facade_with_config(store: &Arc<SqliteStore>, config: FacadeConfig) -> DispatchFacade {
    let registry = RepositoryRegistry::builder()
        .discover(store.repositories())
        .unwrap()
        .build();
    DispatchFacade::with_config(registry, config)
}

pub fn library_facade() -> DispatchFacade {
    facade_over(&library_store())
}

pub fn book(title: &str) -> Record {
    Record::new("Book").with("title", title)
}

pub fn titles(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.text("title").map(str::to_string))
        .collect()
}
