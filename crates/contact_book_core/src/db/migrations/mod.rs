//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//! - Recreate the current schema from scratch on explicit reset.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Schema v1 stores `AGE`; schema v2 replaces it with `BIRTHDAY`. A table
//!   never carries both columns.

use crate::db::{DbError, DbResult};
use crate::model::contact::{birthday_from_age, format_birthday, normalize_name};
use chrono::Local;
use log::{info, warn};
use rusqlite::{params, Connection};

/// DDL of the `contacts` table at the latest schema version.
pub const CONTACTS_TABLE_SQL: &str = include_str!("contacts_table.sql");

#[derive(Clone, Copy)]
enum MigrationStep {
    Sql(&'static str),
    Apply(fn(&Connection) -> DbResult<()>),
}

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    step: MigrationStep,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        step: MigrationStep::Sql(include_str!("0001_contacts_age.sql")),
    },
    Migration {
        version: 2,
        step: MigrationStep::Apply(replace_age_with_birthday),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        match migration.step {
            MigrationStep::Sql(sql) => tx.execute_batch(sql)?,
            MigrationStep::Apply(apply) => apply(&tx)?,
        }
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=ok version={}",
            migration.version
        );
    }
    tx.commit()?;

    Ok(())
}

/// Drops the `contacts` table and recreates it at the latest schema version.
///
/// Every stored contact is lost. Callers must obtain explicit confirmation
/// first.
pub fn reset_schema(conn: &Connection) -> DbResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("DROP TABLE IF EXISTS contacts;")?;
    tx.execute_batch(CONTACTS_TABLE_SQL)?;
    tx.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))?;
    tx.commit()?;

    info!(
        "event=db_reset module=db status=ok version={}",
        latest_version()
    );
    Ok(())
}

/// Returns whether `table` exists in the main schema.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Returns whether `table` has `column`. Column names compare
/// case-insensitively, as SQLite resolves them.
pub(crate) fn table_has_column(
    conn: &Connection,
    table: &str,
    column: &str,
) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// v1 -> v2: rebuild `contacts` with `BIRTHDAY` in place of `AGE`.
///
/// Ages become approximate birthdays so the derived age stays the same on
/// the day of migration. Ages with no representable birthday (negative or
/// out of range) are carried over as an unknown birthday. Unversioned tables
/// that already have `BIRTHDAY` are kept as they are. Names are re-normalized
/// in both cases.
fn replace_age_with_birthday(conn: &Connection) -> DbResult<()> {
    if table_has_column(conn, "contacts", "BIRTHDAY")? {
        return normalize_stored_names(conn);
    }

    let today = Local::now().date_naive();
    conn.execute_batch("ALTER TABLE contacts RENAME TO contacts_v1;")?;
    conn.execute_batch(CONTACTS_TABLE_SQL)?;

    let mut carried = 0_usize;
    let mut dropped_ages = 0_usize;
    {
        let mut select = conn.prepare(
            "SELECT NAME, SURNAME, PHONE, EMAIL, AGE
             FROM contacts_v1
             ORDER BY rowid ASC;",
        )?;
        let mut insert = conn.prepare(
            "INSERT INTO contacts (NAME, SURNAME, PHONE, EMAIL, BIRTHDAY)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;

        let mut rows = select.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let surname: String = row.get(1)?;
            let phone: String = row.get(2)?;
            let email: Option<String> = row.get(3)?;
            let birthday = match row.get::<_, Option<i64>>(4)? {
                Some(age) => {
                    let birthday = birthday_from_age(age, today);
                    if birthday.is_none() {
                        dropped_ages += 1;
                    }
                    birthday
                }
                None => None,
            };

            insert.execute(params![
                normalize_name(&name),
                normalize_name(&surname),
                phone,
                email,
                birthday.map(format_birthday),
            ])?;
            carried += 1;
        }
    }

    conn.execute_batch("DROP TABLE contacts_v1;")?;
    if dropped_ages > 0 {
        warn!("event=db_migrate_ages module=db status=dropped version=2 rows={dropped_ages}");
    }
    info!("event=db_migrate_rows module=db status=ok version=2 rows={carried}");
    Ok(())
}

fn normalize_stored_names(conn: &Connection) -> DbResult<()> {
    let mut select = conn.prepare("SELECT rowid, NAME, SURNAME FROM contacts;")?;
    let mut update =
        conn.prepare("UPDATE contacts SET NAME = ?2, SURNAME = ?3 WHERE rowid = ?1;")?;

    let mut rows = select.query([])?;
    while let Some(row) = rows.next()? {
        let rowid: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        let surname: String = row.get(2)?;
        let normalized_name = normalize_name(&name);
        let normalized_surname = normalize_name(&surname);
        if normalized_name != name || normalized_surname != surname {
            update.execute(params![rowid, normalized_name, normalized_surname])?;
        }
    }
    Ok(())
}
