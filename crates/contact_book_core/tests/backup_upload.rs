use contact_book_core::db::open_db;
use contact_book_core::{
    backup_database, BackupError, BackupResult, BackupUploader, Contact, ContactRepository,
    SqliteContactRepository,
};
use std::cell::RefCell;
use std::path::Path;

#[derive(Default)]
struct RecordingUploader {
    uploads: RefCell<Vec<Vec<u8>>>,
}

impl BackupUploader for RecordingUploader {
    fn upload(&self, bytes: &[u8]) -> BackupResult<()> {
        self.uploads.borrow_mut().push(bytes.to_vec());
        Ok(())
    }
}

struct RejectingUploader;

impl BackupUploader for RejectingUploader {
    fn upload(&self, _bytes: &[u8]) -> BackupResult<()> {
        Err(BackupError::Rejected {
            status: 401,
            body: "invalid_access_token".to_string(),
        })
    }
}

#[test]
fn backup_uploads_entire_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contact_book.db");
    {
        let conn = open_db(&path).unwrap();
        let repo = SqliteContactRepository::try_new(&conn).unwrap();
        repo.insert(&Contact::new("karl", "marx", "089123445"))
            .unwrap();
    }

    let uploader = RecordingUploader::default();
    let uploaded = backup_database(&path, &uploader).unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    let uploads = uploader.uploads.borrow();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0], on_disk);
    assert_eq!(uploaded, on_disk.len());
}

#[test]
fn missing_database_file_fails_before_upload() {
    let uploader = RecordingUploader::default();

    let err = backup_database(Path::new("/nonexistent/contact_book.db"), &uploader).unwrap_err();

    assert!(matches!(err, BackupError::Io { .. }));
    assert!(uploader.uploads.borrow().is_empty());
}

#[test]
fn remote_rejection_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contact_book.db");
    drop(open_db(&path).unwrap());

    let err = backup_database(&path, &RejectingUploader).unwrap_err();

    match err {
        BackupError::Rejected { status, .. } => assert_eq!(status, 401),
        other => panic!("unexpected error: {other}"),
    }
}
