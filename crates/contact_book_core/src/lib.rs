//! Core logic for the contact book.
//! This crate is the single source of truth for contact invariants; the CLI
//! only parses arguments and prints results.

pub mod backup;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use backup::{
    backup_database, resolve_token, BackupError, BackupResult, BackupUploader, DropboxUploader,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::contact::{
    age_in_years, birthday_from_age, normalize_name, parse_birthday, Contact, ContactKey,
    ContactValidationError,
};
pub use repo::contact_repo::{
    ContactRepository, Projection, RepoError, RepoResult, SqliteContactRepository,
};
pub use repo::filter::{ContactField, ContactFilter, ContactPatch, MatchMode, PatchField};
pub use service::contact_service::{
    returned_line, ContactService, ResetOutcome, ServiceError, ServiceResult, ShowQuery,
};
