use chrono::NaiveDate;
use contact_book_core::db::migrations::latest_version;
use contact_book_core::db::open_db_in_memory;
use contact_book_core::{
    Contact, ContactFilter, ContactKey, ContactPatch, ContactRepository, ContactValidationError,
    Projection, RepoError, SqliteContactRepository,
};
use rusqlite::Connection;

fn karl_marx() -> Contact {
    Contact::new("karl", "marx", "089123445")
        .with_email("karl.marx@posteo.de")
        .with_birthday(NaiveDate::from_ymd_opt(1818, 5, 5).unwrap())
}

#[test]
fn insert_and_find_full_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    repo.insert(&karl_marx()).unwrap();

    let found = repo.find(&ContactFilter::new(), Projection::Full).unwrap();
    assert_eq!(found, vec![karl_marx()]);
    assert_eq!(found[0].name, "Karl");
    assert_eq!(found[0].surname, "Marx");
}

#[test]
fn summary_projection_leaves_optional_fields_empty() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    let found = repo
        .find(&ContactFilter::new(), Projection::Summary)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].phone, "089123445");
    assert_eq!(found[0].email, None);
    assert_eq!(found[0].birthday, None);
}

#[test]
fn find_orders_by_surname_then_name() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&Contact::new("karl", "marx", "1")).unwrap();
    repo.insert(&Contact::new("friedrich", "engels", "2")).unwrap();
    repo.insert(&Contact::new("groucho", "marx", "3")).unwrap();

    let names: Vec<String> = repo
        .find(&ContactFilter::new(), Projection::Summary)
        .unwrap()
        .into_iter()
        .map(|contact| format!("{} {}", contact.name, contact.surname))
        .collect();
    assert_eq!(names, vec!["Friedrich Engels", "Groucho Marx", "Karl Marx"]);
}

#[test]
fn exact_and_partial_filters_differ() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    let exact = ContactFilter::new().name("mar");
    assert!(repo.find(&exact, Projection::Summary).unwrap().is_empty());

    let by_surname = ContactFilter::new().surname("mar").partial();
    assert_eq!(repo.find(&by_surname, Projection::Summary).unwrap().len(), 1);

    let both = ContactFilter::new().name("ar").surname("ar").partial();
    assert_eq!(repo.find(&both, Projection::Summary).unwrap().len(), 1);

    let one_side_misses = ContactFilter::new().name("ar").surname("zz").partial();
    assert!(repo
        .find(&one_side_misses, Projection::Summary)
        .unwrap()
        .is_empty());
}

#[test]
fn partial_filter_treats_wildcards_literally() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    let filter = ContactFilter::new().surname("%").partial();
    assert!(repo.find(&filter, Projection::Summary).unwrap().is_empty());
}

#[test]
fn filter_values_are_bound_not_spliced() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    let filter = ContactFilter::new().name("x' OR '1'='1");
    assert!(repo.find(&filter, Projection::Full).unwrap().is_empty());
    assert_eq!(repo.find(&ContactFilter::new(), Projection::Full).unwrap().len(), 1);
}

#[test]
fn exists_matches_normalized_key_only() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    let key = ContactKey::new("KARL", "marx");
    assert!(repo.exists(&ContactFilter::by_key(&key)).unwrap());

    let other = ContactKey::new("groucho", "marx");
    assert!(!repo.exists(&ContactFilter::by_key(&other)).unwrap());
}

#[test]
fn update_changes_only_supplied_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    let patch = ContactPatch {
        phone: Some("030 1234".to_string()),
        ..ContactPatch::default()
    };
    let changed = repo.update(&ContactKey::new("karl", "marx"), &patch).unwrap();
    assert_eq!(changed, 1);

    let contacts = repo.find(&ContactFilter::new(), Projection::Full).unwrap();
    let loaded = &contacts[0];
    assert_eq!(loaded.phone, "030 1234");
    assert_eq!(loaded.email.as_deref(), Some("karl.marx@posteo.de"));
    assert_eq!(loaded.birthday, karl_marx().birthday);
}

#[test]
fn update_missing_key_affects_no_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    let patch = ContactPatch {
        email: Some("nobody@example.org".to_string()),
        ..ContactPatch::default()
    };
    assert_eq!(repo.update(&ContactKey::new("no", "one"), &patch).unwrap(), 0);
}

#[test]
fn update_with_empty_patch_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    let err = repo
        .update(&ContactKey::new("karl", "marx"), &ContactPatch::default())
        .unwrap_err();
    assert!(matches!(err, RepoError::EmptyPatch));
}

#[test]
fn delete_removes_matching_row_only() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();
    repo.insert(&Contact::new("groucho", "marx", "8947529835")).unwrap();

    assert_eq!(repo.delete(&ContactKey::new("karl", "MARX")).unwrap(), 1);
    assert_eq!(repo.delete(&ContactKey::new("karl", "marx")).unwrap(), 0);

    let remaining = repo.find(&ContactFilter::new(), Projection::Summary).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "Groucho");
}

#[test]
fn validation_failure_blocks_insert() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();

    let err = repo.insert(&Contact::new("karl", "marx", " ")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ContactValidationError::EmptyPhone)
    ));
}

#[test]
fn reset_removes_all_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    repo.insert(&karl_marx()).unwrap();

    repo.reset().unwrap();

    assert!(repo.find(&ContactFilter::new(), Projection::Full).unwrap().is_empty());
}

#[test]
fn invalid_stored_birthday_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteContactRepository::try_new(&conn).unwrap();
    conn.execute(
        "INSERT INTO contacts (NAME, SURNAME, PHONE, BIRTHDAY) VALUES ('Karl', 'Marx', '1', 'soon');",
        [],
    )
    .unwrap();

    let err = repo.find(&ContactFilter::new(), Projection::Full).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteContactRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_contacts_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteContactRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable("contacts"))
    ));
}

#[test]
fn repository_rejects_contacts_table_without_birthday() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE contacts (
            NAME TEXT NOT NULL,
            SURNAME TEXT NOT NULL,
            PHONE TEXT NOT NULL,
            EMAIL TEXT,
            AGE INTEGER
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    assert!(matches!(
        SqliteContactRepository::try_new(&conn),
        Err(RepoError::MissingRequiredColumn {
            table: "contacts",
            column: "BIRTHDAY"
        })
    ));
}
