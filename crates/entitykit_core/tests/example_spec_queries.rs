mod common;

use common::{book, library_facade, titles};
use entitykit_core::{FacadeError, PageRequest, Record, RepoError, Sort, Specification};

fn seeded() -> entitykit_core::DispatchFacade {
    let facade = library_facade();
    let herbert = facade
        .save(Record::new("Author").with("name", "Frank Herbert"))
        .unwrap();
    facade
        .save_all(vec![
            book("Dune").with("pages", 412_i64).with("author", herbert.clone()),
            book("Children of Dune").with("pages", 444_i64).with("author", herbert),
            book("Emma").with("pages", 474_i64).with("description", "Highbury"),
            book("Novella").with("pages", 90_i64),
        ])
        .unwrap();
    facade
}

#[test]
fn example_matches_present_fields_only() {
    let facade = seeded();

    let probe = Record::new("Book").with("pages", 474_i64);
    assert_eq!(titles(&facade.find_all_by_example(&probe).unwrap()), vec!["Emma"]);
    assert_eq!(facade.count_by_example(&probe).unwrap(), 1);
    assert!(facade.exists_by_example(&probe).unwrap());

    let everything = Record::new("Book");
    assert_eq!(facade.count_by_example(&everything).unwrap(), 4);

    let nothing = Record::new("Book").with("title", "Ulysses");
    assert!(!facade.exists_by_example(&nothing).unwrap());
    assert!(facade.find_one_by_example(&nothing).unwrap().is_none());
}

#[test]
fn example_matches_to_one_relations_by_id() {
    let facade = seeded();
    let herbert = facade
        .get_by_unique("Author", "name", "Frank Herbert")
        .unwrap()
        .unwrap();

    let probe = Record::new("Book").with("author", herbert);
    let found = facade
        .find_all_by_example_sorted(&probe, &Sort::desc("pages"))
        .unwrap();
    assert_eq!(titles(&found), vec!["Children of Dune", "Dune"]);
}

#[test]
fn find_one_by_example_rejects_multiple_matches() {
    let facade = seeded();
    let probe = Record::new("Book").with("is_archived", false);
    let error = facade.find_one_by_example(&probe).unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));
}

#[test]
fn example_pages_report_totals() {
    let facade = seeded();
    let page = facade
        .find_page_by_example(
            &Record::new("Book"),
            &PageRequest::new(0, 3).sorted(Sort::asc("pages")),
        )
        .unwrap();
    assert_eq!(page.total_elements, 4);
    assert_eq!(titles(&page.content), vec!["Novella", "Dune", "Children of Dune"]);
}

#[test]
fn specification_combines_criteria() {
    let facade = seeded();

    let long_dune = Specification::new().contains("title", "dune").gt("pages", 420_i64);
    let found = facade.find_all_by_spec("Book", &long_dune).unwrap();
    assert_eq!(titles(&found), vec!["Children of Dune"]);

    let short = Specification::new().le("pages", 412_i64);
    assert_eq!(facade.count_by_spec("Book", &short).unwrap(), 2);

    let described = Specification::new().is_not_null("description");
    let one = facade.find_one_by_spec("Book", &described).unwrap().unwrap();
    assert_eq!(one.text("title"), Some("Emma"));

    let undescribed = Specification::new().is_null("description");
    let sorted = facade
        .find_all_by_spec_sorted("Book", &undescribed, &Sort::asc("title"))
        .unwrap();
    assert_eq!(titles(&sorted), vec!["Children of Dune", "Dune", "Novella"]);
}

#[test]
fn not_equal_excludes_null_columns() {
    let facade = seeded();
    let spec = Specification::new().not_eq("description", "Highbury");
    assert_eq!(facade.count_by_spec("Book", &spec).unwrap(), 0);
}

#[test]
fn specification_pages() {
    let facade = seeded();
    let spec = Specification::new().ge("pages", 100_i64);
    let page = facade
        .find_page_by_spec("Book", &spec, &PageRequest::new(1, 2).sorted(Sort::asc("pages")))
        .unwrap();
    assert_eq!(page.total_elements, 3);
    assert_eq!(titles(&page.content), vec!["Emma"]);
}

#[test]
fn unknown_criterion_field_is_a_storage_error() {
    let facade = seeded();
    let spec = Specification::new().eq("publisher", "Chilton");
    let error = facade.find_all_by_spec("Book", &spec).unwrap_err();
    assert!(matches!(
        error,
        FacadeError::Storage(RepoError::UnknownField { ref field, .. }) if field == "publisher"
    ));

    let spec = Specification::new().eq("tags", "scifi");
    assert!(facade.count_by_spec("Book", &spec).is_err());
}
