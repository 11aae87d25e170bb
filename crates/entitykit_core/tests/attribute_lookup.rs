mod common;

use common::{book, library_facade, titles};
use entitykit_core::{
    generate, open_db_in_memory, Argument, DispatchFacade, EntityDeclaration, FacadeError,
    FieldDeclaration, OperationKey, ParamType, Record, Repository, RepositoryRegistry,
    SqliteStore, Value,
};
use std::sync::Arc;
use std::thread;

#[test]
fn get_by_matches_on_equality() {
    let facade = library_facade();
    facade
        .save_all(vec![
            book("Dune").with("pages", 412_i64),
            book("Emma").with("pages", 474_i64),
            book("Dune").with("pages", 896_i64),
        ])
        .unwrap();

    let found = facade.get_by("Book", "title", "Dune").unwrap();
    assert_eq!(found.len(), 2);

    let found = facade.get_by("Book", "pages", 474_i64).unwrap();
    assert_eq!(titles(&found), vec!["Emma"]);

    assert!(facade.get_by("Book", "title", "Ulysses").unwrap().is_empty());
}

#[test]
fn get_by_null_value_is_rejected() {
    let facade = library_facade();
    let error = facade.get_by("Book", "title", Value::Null).unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));
}

#[test]
fn get_by_unique_rejects_multiple_matches() {
    let facade = library_facade();
    facade
        .save_all(vec![
            book("Dune").with("isbn", "978-0441013593"),
            book("Dune").with("isbn", "978-0593099322"),
        ])
        .unwrap();

    let found = facade
        .get_by_unique("Book", "isbn", "978-0441013593")
        .unwrap()
        .unwrap();
    assert_eq!(found.text("title"), Some("Dune"));
    assert!(facade.get_by_unique("Book", "isbn", "none").unwrap().is_none());

    let error = facade.get_by_unique("Book", "title", "Dune").unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));
}

#[test]
fn get_all_by_matches_any_listed_value() {
    let facade = library_facade();
    facade
        .save_all(vec![book("Dune"), book("Emma"), book("Ulysses")])
        .unwrap();

    let found = facade
        .get_all_by("Book", "title", vec![Value::from("Ulysses"), Value::from("Dune")])
        .unwrap();
    assert_eq!(titles(&found), vec!["Dune", "Ulysses"]);

    assert!(facade.get_all_by("Book", "title", Vec::new()).unwrap().is_empty());
}

#[test]
fn unknown_attribute_fails_resolution() {
    let facade = library_facade();
    let error = facade.get_by("Book", "publisher", "Chilton").unwrap_err();
    match error {
        FacadeError::Resolution(resolution) => {
            assert_eq!(resolution.operation, "findByPublisher");
            assert_eq!(resolution.signature, vec![ParamType::Text]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(facade.cache().is_empty());
}

#[test]
fn mistyped_value_fails_resolution() {
    let facade = library_facade();
    let error = facade.get_by("Book", "pages", "many").unwrap_err();
    assert!(matches!(error, FacadeError::Resolution(_)));
}

#[test]
fn relation_fields_have_no_finders() {
    let facade = library_facade();
    let error = facade
        .select_by_resolver("Book", "findByTags", vec![Argument::One(Value::from("scifi"))])
        .unwrap_err();
    assert!(matches!(error, FacadeError::Resolution(_)));
}

#[test]
fn custom_query_runs_through_the_resolver() {
    let facade = library_facade();
    facade
        .save_all(vec![
            book("Dune").with("pages", 412_i64),
            book("Emma").with("pages", 474_i64),
            book("Novella").with("pages", 90_i64),
        ])
        .unwrap();

    let found = facade
        .select_by_resolver("Book", "longerThan", vec![Argument::from(Value::from(400_i64))])
        .unwrap();
    assert_eq!(titles(&found), vec!["Dune", "Emma"]);
}

#[test]
fn concurrent_resolution_shares_one_handle() {
    let facade = Arc::new(library_facade());
    facade.save(book("Dune")).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let facade = Arc::clone(&facade);
            thread::spawn(move || facade.get_by("Book", "title", "Dune").unwrap().len())
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), 1);
    }

    assert_eq!(facade.cache().len(), 1);
    let key = OperationKey::new("Book", "findByTitle", vec![ParamType::Text]);
    let cached = facade.cache().get(&key).unwrap();
    let repository = facade.registry().get("Book").unwrap();
    let resolved = repository.operation("findByTitle", &[ParamType::Text]).unwrap();
    assert!(Arc::ptr_eq(&cached, &resolved));
}

#[test]
fn finder_name_collision_keeps_the_first_field() {
    let output = generate(&[EntityDeclaration::new("Person")
        .field(FieldDeclaration::text("firstName"))
        .field(FieldDeclaration::text("first_name"))]);
    assert!(output.has_errors());

    let store = SqliteStore::open(open_db_in_memory().unwrap(), &output).unwrap();
    let registry = RepositoryRegistry::builder()
        .discover(store.repositories())
        .unwrap()
        .build();
    let facade = DispatchFacade::new(registry);

    facade
        .save(Record::new("Person").with("firstName", "Ann"))
        .unwrap();
    let rejected = Record::new("Person").with("first_name", "Bob");
    assert!(facade.save(rejected).is_err());

    let found = facade.get_by("Person", "firstName", "Ann").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text("firstName"), Some("Ann"));
}
