//! Contact repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the store primitives over the single `contacts` table: reset,
//!   insert, find, exists, update, delete.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Contact::validate()` before SQL mutations.
//! - Every value reaches SQLite as a bound parameter.
//! - Reads are ordered by `SURNAME ASC, NAME ASC`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{latest_version, table_exists, table_has_column};
use crate::db::{reset_schema, DbError};
use crate::model::contact::{
    format_birthday, parse_stored_birthday, Contact, ContactKey, ContactValidationError,
};
use crate::repo::filter::{ContactFilter, ContactPatch};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CONTACT_COLUMNS: [&str; 5] = ["NAME", "SURNAME", "PHONE", "EMAIL", "BIRTHDAY"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for contact persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ContactValidationError),
    Db(DbError),
    /// Update requested with no field to change.
    EmptyPatch,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::EmptyPatch => write!(f, "update requires at least one field"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "contact repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "contact repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "contact repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted contact data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::EmptyPatch => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ContactValidationError> for RepoError {
    fn from(value: ContactValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Column set returned by [`ContactRepository::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Projection {
    /// Name, surname and phone only; optional fields come back as `None`.
    #[default]
    Summary,
    /// Every column.
    Full,
}

impl Projection {
    fn columns(self) -> &'static str {
        match self {
            Self::Summary => "NAME, SURNAME, PHONE",
            Self::Full => "NAME, SURNAME, PHONE, EMAIL, BIRTHDAY",
        }
    }
}

/// Repository interface for the contact store.
pub trait ContactRepository {
    /// Drops every contact and recreates the table.
    fn reset(&self) -> RepoResult<()>;
    /// Inserts one contact and commits.
    fn insert(&self, contact: &Contact) -> RepoResult<()>;
    /// Lists contacts matching `filter`, ordered by surname.
    fn find(&self, filter: &ContactFilter, projection: Projection) -> RepoResult<Vec<Contact>>;
    /// Returns whether at least one contact matches `filter`.
    fn exists(&self, filter: &ContactFilter) -> RepoResult<bool>;
    /// Applies `patch` to contacts matching `key`; returns affected rows.
    fn update(&self, key: &ContactKey, patch: &ContactPatch) -> RepoResult<usize>;
    /// Deletes contacts matching `key`; returns affected rows.
    fn delete(&self, key: &ContactKey) -> RepoResult<usize>;
}

/// SQLite-backed contact repository.
pub struct SqliteContactRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteContactRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// Rejects connections that were not opened through `db::open_db*`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_contact_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn reset(&self) -> RepoResult<()> {
        reset_schema(self.conn)?;
        Ok(())
    }

    fn insert(&self, contact: &Contact) -> RepoResult<()> {
        contact.validate()?;

        self.conn.execute(
            "INSERT INTO contacts (
                NAME,
                SURNAME,
                PHONE,
                EMAIL,
                BIRTHDAY
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                contact.name.as_str(),
                contact.surname.as_str(),
                contact.phone.as_str(),
                contact.email.as_deref(),
                contact.birthday.map(format_birthday),
            ],
        )?;

        Ok(())
    }

    fn find(&self, filter: &ContactFilter, projection: Projection) -> RepoResult<Vec<Contact>> {
        let (where_clause, bind_values) = filter.to_where_clause(1);
        let sql = format!(
            "SELECT {} FROM contacts{where_clause} ORDER BY SURNAME ASC, NAME ASC;",
            projection.columns()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut contacts = Vec::new();
        while let Some(row) = rows.next()? {
            contacts.push(parse_contact_row(row, projection)?);
        }

        Ok(contacts)
    }

    fn exists(&self, filter: &ContactFilter) -> RepoResult<bool> {
        let (where_clause, bind_values) = filter.to_where_clause(1);
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM contacts{where_clause});"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, key: &ContactKey, patch: &ContactPatch) -> RepoResult<usize> {
        if patch.is_empty() {
            return Err(RepoError::EmptyPatch);
        }

        let (set_clause, mut bind_values) = patch.to_set_clause();
        let (where_clause, key_values) =
            ContactFilter::by_key(key).to_where_clause(bind_values.len() + 1);
        bind_values.extend(key_values);

        let changed = self.conn.execute(
            &format!("UPDATE contacts SET {set_clause}{where_clause};"),
            params_from_iter(bind_values),
        )?;
        Ok(changed)
    }

    fn delete(&self, key: &ContactKey) -> RepoResult<usize> {
        let (where_clause, bind_values) = ContactFilter::by_key(key).to_where_clause(1);
        let changed = self.conn.execute(
            &format!("DELETE FROM contacts{where_clause};"),
            params_from_iter(bind_values),
        )?;
        Ok(changed)
    }
}

fn parse_contact_row(row: &Row<'_>, projection: Projection) -> RepoResult<Contact> {
    let (email, birthday) = match projection {
        Projection::Summary => (None, None),
        Projection::Full => {
            let email: Option<String> = row.get("EMAIL")?;
            let birthday = match row.get::<_, Option<String>>("BIRTHDAY")? {
                Some(value) => Some(parse_stored_birthday(&value).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid birthday `{value}` in contacts.BIRTHDAY"
                    ))
                })?),
                None => None,
            };
            (email, birthday)
        }
    };

    Ok(Contact {
        name: row.get("NAME")?,
        surname: row.get("SURNAME")?,
        phone: row.get("PHONE")?,
        email,
        birthday,
    })
}

fn ensure_contact_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "contacts")? {
        return Err(RepoError::MissingRequiredTable("contacts"));
    }

    for column in CONTACT_COLUMNS {
        if !table_has_column(conn, "contacts", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "contacts",
                column,
            });
        }
    }

    Ok(())
}
