use leornian_core::db::open_db_in_memory;
use leornian_core::model::collection::CollectionFilter;
use leornian_core::model::note::{NewNote, Visibility};
use leornian_core::model::user::{NewUser, User};
use leornian_core::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use leornian_core::repo::user_repo::SqliteUserRepository;
use leornian_core::service::collection_service::CollectionService;
use leornian_core::service::note_service::{preview_html, NoteService};
use leornian_core::service::user_service::UserService;
use leornian_core::ServiceError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::{params, Connection};

#[test]
fn created_note_is_collected_by_its_author() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);

    let note = NoteService::new(&mut conn)
        .create_note(&author, &NewNote::new("Some *thought*"))
        .unwrap();
    assert_eq!(note.code.len(), 9);
    assert_eq!(note.author_username.as_deref(), Some("mary"));
    assert_eq!(note.html(), "<p>Some <em>thought</em></p>\n");

    let collections = CollectionService::new(&conn);
    assert!(collections.is_saved(&author, &note.code).unwrap());
    let page = collections
        .list(&author, CollectionFilter::AuthoredByMe, None)
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].code, note.code);
}

#[test]
fn invalid_note_text_is_rejected_before_storage() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);

    let err = NoteService::new(&mut conn)
        .create_note(&author, &NewNote::new("   "))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(preview_html(&"x".repeat(1201)).is_err());
    assert_eq!(preview_html("**bold**").unwrap(), "<p><strong>bold</strong></p>\n");

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn author_page_lists_normal_notes_newest_first() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);
    let mut service = NoteService::new(&mut conn);
    let first = service.create_note(&author, &NewNote::new("first")).unwrap();
    service
        .create_note(&author, &NewNote::new("hidden").unlisted())
        .unwrap();
    let second = service.create_note(&author, &NewNote::new("second")).unwrap();
    drop(service);
    set_created(&conn, &first.code, 1_000);
    set_created(&conn, &second.code, 2_000);

    let service = NoteService::new(&mut conn);
    let page = service.notes_by_author("mary", None).unwrap();
    let codes: Vec<_> = page.items.iter().map(|note| note.code.as_str()).collect();
    assert_eq!(codes, vec![second.code.as_str(), first.code.as_str()]);

    let err = service.notes_by_author("nobody", None).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "user", .. }));
}

#[test]
fn random_note_skips_unlisted_authored_and_collected_notes() {
    let mut conn = open_db_in_memory().unwrap();
    let mary = create_user(&conn, "mary", false);
    let bob = create_user(&conn, "bob", false);
    let mut notes = NoteService::new(&mut conn);
    notes
        .create_note(&mary, &NewNote::new("unlisted").unlisted())
        .unwrap();
    let listed = notes.create_note(&mary, &NewNote::new("listed")).unwrap();
    let mut rng = StdRng::seed_from_u64(4);

    assert_eq!(
        notes.random_note(Some(&bob), &mut rng).unwrap().map(|note| note.code),
        Some(listed.code.clone())
    );
    assert!(notes.random_note(Some(&mary), &mut rng).unwrap().is_none());
    assert!(notes.random_note(None, &mut rng).unwrap().is_some());
    drop(notes);

    CollectionService::new(&conn).save(&bob, &listed.code).unwrap();
    let notes = NoteService::new(&mut conn);
    assert!(notes.random_note(Some(&bob), &mut rng).unwrap().is_none());
}

#[test]
fn locked_visibility_blocks_the_author_but_not_staff() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);
    let staff = create_user(&conn, "mod", true);
    let mut service = NoteService::new(&mut conn);
    let note = service.create_note(&author, &NewNote::new("text")).unwrap();

    let updated = service
        .set_visibility(&author, &note.code, Visibility::Unlisted)
        .unwrap();
    assert_eq!(updated.visibility, Visibility::Unlisted);

    let err = service
        .moderate_visibility(&author, &note.code, Visibility::Normal, true)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let locked = service
        .moderate_visibility(&staff, &note.code, Visibility::Unlisted, true)
        .unwrap();
    assert!(locked.visibility_locked);

    let err = service
        .set_visibility(&author, &note.code, Visibility::Normal)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let err = service
        .set_visibility(&staff, &note.code, Visibility::Normal)
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));
}

#[test]
fn deattribution_nulls_author_and_purge_respects_age() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);
    let mut service = NoteService::new(&mut conn);
    let note = service.create_note(&author, &NewNote::new("text")).unwrap();

    let deattributed = service.deattribute(&author, &note.code).unwrap();
    assert_eq!(deattributed.author_id, None);
    assert_eq!(deattributed.author_username, None);
    assert!(matches!(
        service.deattribute(&author, &note.code),
        Err(ServiceError::PermissionDenied(_))
    ));

    assert!(matches!(
        service.purge_deattributions(0),
        Err(ServiceError::Validation(_))
    ));
    assert_eq!(service.purge_deattributions(1).unwrap(), 0);
    drop(service);

    conn.execute("UPDATE deattributions SET created_at = 0;", [])
        .unwrap();
    assert_eq!(
        NoteService::new(&mut conn).purge_deattributions(1).unwrap(),
        1
    );
    let remaining = SqliteNoteRepository::try_new(&conn)
        .unwrap()
        .list_deattributions()
        .unwrap();
    assert!(remaining.is_empty());
}

#[test]
fn only_the_author_deletes_and_collections_follow() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);
    let reader = create_user(&conn, "bob", false);
    let note = NoteService::new(&mut conn)
        .create_note(&author, &NewNote::new("text"))
        .unwrap();
    CollectionService::new(&conn).save(&reader, &note.code).unwrap();

    let service = NoteService::new(&mut conn);
    assert!(matches!(
        service.delete_note(&reader, &note.code),
        Err(ServiceError::PermissionDenied(_))
    ));
    service.delete_note(&author, &note.code).unwrap();
    assert!(matches!(
        service.get_note(&note.code),
        Err(ServiceError::NotFound { .. })
    ));

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM collections;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn save_is_idempotent_and_unknown_codes_are_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let author = create_user(&conn, "mary", false);
    let reader = create_user(&conn, "bob", false);
    let note = NoteService::new(&mut conn)
        .create_note(&author, &NewNote::new("text"))
        .unwrap();

    let collections = CollectionService::new(&conn);
    assert!(collections.save(&reader, &note.code).unwrap().changed);
    assert!(!collections.save(&reader, &note.code).unwrap().changed);
    assert!(collections.unsave(&reader, &note.code).unwrap().changed);
    assert!(!collections.unsave(&reader, &note.code).unwrap().changed);
    assert!(matches!(
        collections.save(&reader, "ZZZZZZZZZ"),
        Err(ServiceError::NotFound { entity: "note", .. })
    ));
}

#[test]
fn collection_filters_partition_the_views() {
    let mut conn = open_db_in_memory().unwrap();
    let mary = create_user(&conn, "mary", false);
    let bob = create_user(&conn, "bob", false);
    let mut notes = NoteService::new(&mut conn);
    let own = notes.create_note(&mary, &NewNote::new("mine")).unwrap();
    let dropped = notes.create_note(&mary, &NewNote::new("dropped")).unwrap();
    let other = notes.create_note(&bob, &NewNote::new("theirs")).unwrap();
    drop(notes);

    let collections = CollectionService::new(&conn);
    collections.save(&mary, &other.code).unwrap();
    collections.unsave(&mary, &dropped.code).unwrap();
    conn.execute(
        "UPDATE collections SET promoted = 1
         WHERE user_id = ?1 AND note_id = ?2;",
        params![mary.id, other.id],
    )
    .unwrap();

    let codes = |filter| -> Vec<String> {
        collections
            .list(&mary, filter, None)
            .unwrap()
            .items
            .into_iter()
            .map(|note| note.code)
            .collect()
    };
    assert_eq!(codes(CollectionFilter::All).len(), 2);
    assert_eq!(codes(CollectionFilter::AuthoredByMe), vec![own.code.clone()]);
    assert_eq!(codes(CollectionFilter::AuthoredByOthers), vec![other.code.clone()]);
    assert_eq!(codes(CollectionFilter::Promoted), vec![other.code.clone()]);
    assert_eq!(codes(CollectionFilter::AuthoredNotCollected), vec![dropped.code]);
}

#[test]
fn pages_past_the_end_serve_the_last_page() {
    let mut conn = open_db_in_memory().unwrap();
    let mary = create_user(&conn, "mary", false);
    let mut notes = NoteService::new(&mut conn);
    for index in 0..12 {
        notes
            .create_note(&mary, &NewNote::new(format!("note {index}")))
            .unwrap();
    }
    drop(notes);

    let collections = CollectionService::new(&conn);
    let last = collections
        .list(&mary, CollectionFilter::All, Some(9))
        .unwrap();
    assert_eq!(last.number, 2);
    assert_eq!(last.num_pages, 2);
    assert_eq!(last.items.len(), 2);
    assert!(!last.has_next());
    assert!(matches!(
        collections.list(&mary, CollectionFilter::All, Some(0)),
        Err(ServiceError::Validation(_))
    ));
}

#[test]
fn deleting_a_user_keeps_their_notes_unattributed() {
    let mut conn = open_db_in_memory().unwrap();
    let mary = create_user(&conn, "mary", false);
    let note = NoteService::new(&mut conn)
        .create_note(&mary, &NewNote::new("text"))
        .unwrap();

    UserService::new(SqliteUserRepository::try_new(&conn).unwrap())
        .delete_user(mary.id)
        .unwrap();

    let orphan = NoteService::new(&mut conn).get_note(&note.code).unwrap();
    assert_eq!(orphan.author_id, None);
    let entries: i64 = conn
        .query_row("SELECT COUNT(*) FROM collections;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(entries, 0);
}

#[test]
fn usernames_are_unique() {
    let conn = open_db_in_memory().unwrap();
    create_user(&conn, "mary", false);
    let err = UserService::new(SqliteUserRepository::try_new(&conn).unwrap())
        .create_user(&NewUser::new("mary", "other@example.com"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

fn create_user(conn: &Connection, username: &str, is_staff: bool) -> User {
    let mut user = NewUser::new(username, format!("{username}@example.com"));
    if is_staff {
        user = user.staff();
    }
    UserService::new(SqliteUserRepository::try_new(conn).unwrap())
        .create_user(&user)
        .unwrap()
}

fn set_created(conn: &Connection, code: &str, created_at: i64) {
    conn.execute(
        "UPDATE notes SET created_at = ?2 WHERE code = ?1;",
        params![code, created_at],
    )
    .unwrap();
}
