//! Contact book use-case service.
//!
//! # Responsibility
//! - Implement the reset/new/show/update/delete commands above the store.
//! - Enforce the `(name, surname)` uniqueness convention before inserts.
//!
//! # Invariants
//! - Every key and filter value is normalized before it reaches the store.
//! - Conflicts, missing contacts and empty updates abort before any write.
//! - Each mutating command issues exactly one SQL statement.

use crate::model::contact::{normalize_name, Contact, ContactKey};
use crate::repo::contact_repo::{ContactRepository, Projection, RepoError};
use crate::repo::filter::{ContactFilter, ContactPatch, MatchMode};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from contact commands.
#[derive(Debug)]
pub enum ServiceError {
    /// A contact with the same name and surname already exists.
    Conflict(ContactKey),
    /// No contact has the given name and surname.
    NotFound(ContactKey),
    /// Update called without any field to change.
    NothingToUpdate,
    /// Store-level failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(key) => write!(f, "contact {key} already exists"),
            Self::NotFound(key) => write!(f, "contact {key} not found"),
            Self::NothingToUpdate => write!(
                f,
                "nothing to update; supply at least one of phone, email or birthday"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::EmptyPatch => Self::NothingToUpdate,
            other => Self::Repo(other),
        }
    }
}

/// Result of a confirmed or declined reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    Cancelled,
}

/// Search options of the `show` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShowQuery {
    /// Return every column instead of name, surname and phone.
    pub all: bool,
    pub name: Option<String>,
    pub surname: Option<String>,
    /// Substring matching instead of equality.
    pub find: bool,
}

impl ShowQuery {
    pub fn filter(&self) -> ContactFilter {
        let mut filter = ContactFilter::new();
        if let Some(name) = self.name.as_deref() {
            filter = filter.name(name);
        }
        if let Some(surname) = self.surname.as_deref() {
            filter = filter.surname(surname);
        }
        let mode = if self.find {
            MatchMode::Partial
        } else {
            MatchMode::Exact
        };
        filter.with_mode(mode)
    }

    pub fn projection(&self) -> Projection {
        if self.all {
            Projection::Full
        } else {
            Projection::Summary
        }
    }
}

/// Closing line printed after a `show` listing.
pub fn returned_line(count: usize) -> String {
    format!("Returned {count} contacts")
}

/// Use-case service wrapping a contact repository.
pub struct ContactService<R: ContactRepository> {
    repo: R,
}

impl<R: ContactRepository> ContactService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Recreates the store when `confirmed`; otherwise does nothing.
    pub fn reset(&self, confirmed: bool) -> ServiceResult<ResetOutcome> {
        if !confirmed {
            info!("event=contacts_reset module=service status=cancelled");
            return Ok(ResetOutcome::Cancelled);
        }

        self.repo.reset()?;
        info!("event=contacts_reset module=service status=ok");
        Ok(ResetOutcome::Reset)
    }

    /// Stores a new contact unless one with the same key exists.
    ///
    /// Returns the stored (normalized) record.
    pub fn create(&self, mut contact: Contact) -> ServiceResult<Contact> {
        contact.name = normalize_name(&contact.name);
        contact.surname = normalize_name(&contact.surname);

        if self.contains(&contact.name, &contact.surname)? {
            info!("event=contact_create module=service status=conflict");
            return Err(ServiceError::Conflict(contact.key()));
        }

        self.repo.insert(&contact)?;
        info!(
            "event=contact_create module=service status=ok has_email={} has_birthday={}",
            contact.email.is_some(),
            contact.birthday.is_some()
        );
        Ok(contact)
    }

    /// Lists contacts selected by `query`, ordered by surname.
    pub fn show(&self, query: &ShowQuery) -> ServiceResult<Vec<Contact>> {
        let filter = query.filter();
        let contacts = self.repo.find(&filter, query.projection())?;
        info!(
            "event=contacts_show module=service status=ok conditions={} partial={} full={} returned={}",
            filter.conditions().len(),
            query.find,
            query.all,
            contacts.len()
        );
        Ok(contacts)
    }

    /// Applies `patch` to the contact named by `key`.
    ///
    /// Returns the number of rows changed.
    pub fn update(&self, key: &ContactKey, patch: &ContactPatch) -> ServiceResult<usize> {
        if patch.is_empty() {
            return Err(ServiceError::NothingToUpdate);
        }
        if !self.contains(key.name(), key.surname())? {
            info!("event=contact_update module=service status=not_found");
            return Err(ServiceError::NotFound(key.clone()));
        }

        let changed = self.repo.update(key, patch)?;
        info!(
            "event=contact_update module=service status=ok fields={} rows={}",
            patch.fields().len(),
            changed
        );
        Ok(changed)
    }

    /// Removes the contact named by `key`.
    ///
    /// Returns the number of rows removed.
    pub fn delete(&self, key: &ContactKey) -> ServiceResult<usize> {
        if !self.contains(key.name(), key.surname())? {
            info!("event=contact_delete module=service status=not_found");
            return Err(ServiceError::NotFound(key.clone()));
        }

        let removed = self.repo.delete(key)?;
        info!("event=contact_delete module=service status=ok rows={removed}");
        Ok(removed)
    }

    /// Returns whether a contact with this name and surname is stored.
    ///
    /// Both parts are normalized and compared by equality.
    pub fn contains(&self, name: &str, surname: &str) -> ServiceResult<bool> {
        let key = ContactKey::new(name, surname);
        Ok(self.repo.exists(&ContactFilter::by_key(&key))?)
    }
}
