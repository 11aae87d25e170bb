mod common;

use common::{book, library_facade};
use entitykit_core::{FacadeError, Record};
use uuid::Uuid;

fn tag(label: &str) -> Record {
    Record::new("Tag").with("label", label)
}

fn labels(record: &Record) -> Vec<String> {
    record
        .list("tags")
        .unwrap_or_default()
        .iter()
        .filter_map(|tag| tag.text("label").map(str::to_string))
        .collect()
}

#[test]
fn add_new_saves_items_and_appends_them() {
    let facade = library_facade();
    let owner = facade.save(book("Dune").with("tags", vec![facade.save(tag("scifi")).unwrap()])).unwrap();

    let added = facade
        .add_new_to_collection_in(&owner, "tags", vec![tag("classic"), tag("desert")])
        .unwrap();
    assert_eq!(added.len(), 2);
    assert!(added.iter().all(|item| item.id().is_some()));

    let reloaded = facade.get_one("Book", owner.id().unwrap()).unwrap();
    assert_eq!(labels(&reloaded), vec!["scifi", "classic", "desert"]);
    assert_eq!(facade.count("Tag").unwrap(), 3);
}

#[test]
fn attach_existing_refetches_and_skips_deleted_items() {
    let facade = library_facade();
    let owner = facade.save(book("Dune")).unwrap();
    let tags = facade.save_all(vec![tag("scifi"), tag("classic")]).unwrap();
    facade.delete(&tags[1]).unwrap();

    let mut stale = tags[0].clone();
    stale.set("label", "renamed locally");
    let attached = facade
        .attach_existing_to_collection_in(&owner, "tags", &[stale, tags[1].clone()])
        .unwrap();

    assert_eq!(attached.len(), 1);
    let reloaded = facade.get_one("Book", owner.id().unwrap()).unwrap();
    assert_eq!(labels(&reloaded), vec!["scifi"]);
}

#[test]
fn attach_requires_saved_items() {
    let facade = library_facade();
    let owner = facade.save(book("Dune")).unwrap();
    let error = facade
        .attach_existing_to_collection_in(&owner, "tags", &[tag("unsaved")])
        .unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));
}

#[test]
fn missing_owner_is_rejected() {
    let facade = library_facade();
    let mut ghost = book("Ghost");
    ghost.set_id(Uuid::new_v4());

    let error = facade
        .add_new_to_collection_in(&ghost, "tags", vec![tag("scifi")])
        .unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));
    assert_eq!(facade.count("Tag").unwrap(), 0);
}

#[test]
fn field_must_be_a_collection_of_the_item_entity() {
    let facade = library_facade();
    let owner = facade.save(book("Dune")).unwrap();

    let error = facade
        .add_new_to_collection_in(&owner, "author", vec![Record::new("Author")])
        .unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));

    let error = facade
        .add_new_to_collection_in(&owner, "tags", vec![Record::new("Author")])
        .unwrap_err();
    assert!(matches!(error, FacadeError::InvalidArgument(_)));
}

#[test]
fn empty_item_list_is_a_no_op() {
    let facade = library_facade();
    let owner = facade.save(book("Dune")).unwrap();
    assert!(facade
        .add_new_to_collection_in(&owner, "tags", Vec::new())
        .unwrap()
        .is_empty());
    assert!(facade
        .attach_existing_to_collection_in(&owner, "tags", &[])
        .unwrap()
        .is_empty());
}
