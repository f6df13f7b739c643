//! Contact domain model.
//!
//! # Responsibility
//! - Define the canonical in-memory contact record.
//! - Own name normalization, birthday parsing and age derivation.
//! - Render one contact as a delimited text card for terminal output.
//!
//! # Invariants
//! - `name` and `surname` are stored capitalized (see [`normalize_name`]).
//! - `(name, surname)` identifies a contact by convention; see [`ContactKey`].
//! - Age is derived as whole days divided by 365, not calendar years.

use chrono::{Days, NaiveDate, NaiveDateTime};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Width of the dashed line framing a rendered contact card.
pub const CARD_DELIMITER_WIDTH: usize = 40;

/// Text format used for the `BIRTHDAY` column.
pub const BIRTHDAY_STORAGE_FORMAT: &str = "%Y-%m-%d";

const DAYS_PER_YEAR: u64 = 365;
const LEGACY_BIRTHDAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const BIRTHDAY_INPUT_FORMATS: [&str; 2] = ["%d-%m-%Y", BIRTHDAY_STORAGE_FORMAT];

/// One contact book entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Capitalized first name.
    pub name: String,
    /// Capitalized family name.
    pub surname: String,
    /// Free-form phone number.
    pub phone: String,
    pub email: Option<String>,
    pub birthday: Option<NaiveDate>,
}

/// Presence violations detected before a contact is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactValidationError {
    EmptyName,
    EmptySurname,
    EmptyPhone,
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "contact name must not be blank"),
            Self::EmptySurname => write!(f, "contact surname must not be blank"),
            Self::EmptyPhone => write!(f, "contact phone must not be blank"),
        }
    }
}

impl Error for ContactValidationError {}

impl Contact {
    /// Creates a contact with normalized name/surname and no optional fields.
    pub fn new(
        name: impl AsRef<str>,
        surname: impl AsRef<str>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            surname: normalize_name(surname.as_ref()),
            phone: phone.into(),
            email: None,
            birthday: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_birthday(mut self, birthday: NaiveDate) -> Self {
        self.birthday = Some(birthday);
        self
    }

    /// Returns the lookup key of this contact.
    pub fn key(&self) -> ContactKey {
        ContactKey::new(&self.name, &self.surname)
    }

    /// Checks required fields are present.
    pub fn validate(&self) -> Result<(), ContactValidationError> {
        if self.name.trim().is_empty() {
            return Err(ContactValidationError::EmptyName);
        }
        if self.surname.trim().is_empty() {
            return Err(ContactValidationError::EmptySurname);
        }
        if self.phone.trim().is_empty() {
            return Err(ContactValidationError::EmptyPhone);
        }
        Ok(())
    }

    /// Age in whole years at `today`, when a birthday is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<i64> {
        self.birthday.map(|birthday| age_in_years(birthday, today))
    }

    /// Renders the contact card as of `today`.
    ///
    /// Layout: delimiter, `NAME SURNAME`, phone, optional email, optional
    /// age, delimiter.
    pub fn card(&self, today: NaiveDate) -> String {
        let delimiter = "-".repeat(CARD_DELIMITER_WIDTH);
        let mut lines = vec![
            delimiter.clone(),
            format!(
                "{} {}",
                self.name.to_uppercase(),
                self.surname.to_uppercase()
            ),
            self.phone.clone(),
        ];
        if let Some(email) = self.email.as_deref() {
            lines.push(email.to_string());
        }
        if let Some(age) = self.age_on(today) {
            lines.push(format!("Age: {age}"));
        }
        lines.push(delimiter);
        lines.join("\n")
    }
}

/// Normalized `(name, surname)` pair used for existence checks, updates and
/// deletes.
///
/// Fields are private so every key in flight is already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactKey {
    name: String,
    surname: String,
}

impl ContactKey {
    pub fn new(name: impl AsRef<str>, surname: impl AsRef<str>) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            surname: normalize_name(surname.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }
}

impl Display for ContactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.surname)
    }
}

/// Capitalizes a name: trims it, upper-cases the first character and
/// lower-cases the rest.
///
/// `"mARX "` becomes `"Marx"`, `"o'neil"` becomes `"O'neil"`.
pub fn normalize_name(raw: &str) -> String {
    let mut chars = raw.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Parses a birthday typed on the command line.
///
/// Accepts `DD-MM-YYYY` and `YYYY-MM-DD`.
pub fn parse_birthday(input: &str) -> Result<NaiveDate, String> {
    let trimmed = input.trim();
    BIRTHDAY_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| format!("invalid date `{trimmed}`; expected DD-MM-YYYY or YYYY-MM-DD"))
}

/// Parses a birthday read back from storage.
///
/// Rows written by older releases may carry a `YYYY-MM-DD HH:MM:SS` value;
/// the time part is dropped.
pub fn parse_stored_birthday(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, BIRTHDAY_STORAGE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, LEGACY_BIRTHDAY_FORMAT)
                .ok()
                .map(|datetime| datetime.date())
        })
}

pub fn format_birthday(birthday: NaiveDate) -> String {
    birthday.format(BIRTHDAY_STORAGE_FORMAT).to_string()
}

/// Whole years between `birthday` and `today`, as elapsed days / 365.
///
/// Ignores leap days, so the result can run ahead of the calendar age by a
/// few days around each birthday.
pub fn age_in_years(birthday: NaiveDate, today: NaiveDate) -> i64 {
    (today - birthday).num_days() / DAYS_PER_YEAR as i64
}

/// Inverse of [`age_in_years`]: the birthday whose derived age at `today`
/// is exactly `age`.
///
/// Returns `None` for negative ages or dates outside the supported range.
pub fn birthday_from_age(age: i64, today: NaiveDate) -> Option<NaiveDate> {
    let days = u64::try_from(age).ok()?.checked_mul(DAYS_PER_YEAR)?;
    today.checked_sub_days(Days::new(days))
}
