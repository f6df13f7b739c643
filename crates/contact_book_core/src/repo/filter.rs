//! Structured predicates and patches for the `contacts` table.
//!
//! # Responsibility
//! - Describe row filters as `{field, operator, value}` conditions.
//! - Describe partial updates as `{field, value}` assignments.
//! - Translate both into SQL fragments with positional placeholders.
//!
//! # Invariants
//! - Column names come only from [`ContactField`] / [`PatchField`]; user
//!   input is always bound, never spliced into SQL text.
//! - Match mode belongs to the whole filter: partial mode rewrites every
//!   condition to `LIKE '%value%'`.

use crate::model::contact::{format_birthday, normalize_name, ContactKey};
use chrono::NaiveDate;
use rusqlite::types::Value;

const LIKE_ESCAPE: char = '\\';

/// Columns a [`ContactFilter`] can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactField {
    Name,
    Surname,
}

impl ContactField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Surname => "SURNAME",
        }
    }
}

/// How filter values are compared against stored values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// `column = value`.
    #[default]
    Exact,
    /// `column LIKE '%value%'` (substring containment).
    Partial,
}

/// One `field = value` condition, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: ContactField,
    pub value: String,
}

/// Conjunction of conditions on name and/or surname.
///
/// An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    conditions: Vec<Condition>,
    mode: MatchMode,
}

impl ContactFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match on both parts of `key`.
    pub fn by_key(key: &ContactKey) -> Self {
        Self::new()
            .with_condition(ContactField::Name, key.name())
            .with_condition(ContactField::Surname, key.surname())
    }

    /// Adds a name condition; the value is normalized first.
    pub fn name(self, value: &str) -> Self {
        self.with_condition(ContactField::Name, &normalize_name(value))
    }

    /// Adds a surname condition; the value is normalized first.
    pub fn surname(self, value: &str) -> Self {
        self.with_condition(ContactField::Surname, &normalize_name(value))
    }

    /// Switches every condition of this filter to substring matching.
    pub fn partial(mut self) -> Self {
        self.mode = MatchMode::Partial;
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn with_condition(mut self, field: ContactField, value: &str) -> Self {
        self.conditions.push(Condition {
            field,
            value: value.to_string(),
        });
        self
    }

    /// Builds the `WHERE` clause and its bind values.
    ///
    /// Placeholders are numbered from `first_placeholder` so the clause can
    /// follow other bound parameters. Returns an empty clause for an empty
    /// filter.
    pub(crate) fn to_where_clause(&self, first_placeholder: usize) -> (String, Vec<Value>) {
        if self.conditions.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut predicates = Vec::with_capacity(self.conditions.len());
        let mut bind_values = Vec::with_capacity(self.conditions.len());
        for (offset, condition) in self.conditions.iter().enumerate() {
            let placeholder = first_placeholder + offset;
            let column = condition.field.column();
            match self.mode {
                MatchMode::Exact => {
                    predicates.push(format!("{column} = ?{placeholder}"));
                    bind_values.push(Value::Text(condition.value.clone()));
                }
                MatchMode::Partial => {
                    predicates.push(format!(
                        "{column} LIKE ?{placeholder} ESCAPE '{LIKE_ESCAPE}'"
                    ));
                    bind_values.push(Value::Text(format!(
                        "%{}%",
                        escape_like(&condition.value)
                    )));
                }
            }
        }

        (format!(" WHERE {}", predicates.join(" AND ")), bind_values)
    }
}

/// Columns a [`ContactPatch`] can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchField {
    Phone,
    Email,
    Birthday,
}

impl PatchField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Phone => "PHONE",
            Self::Email => "EMAIL",
            Self::Birthday => "BIRTHDAY",
        }
    }
}

/// Partial update of one contact. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none() && self.birthday.is_none()
    }

    /// Supplied fields in column order.
    pub fn fields(&self) -> Vec<PatchField> {
        self.assignments()
            .into_iter()
            .map(|(field, _)| field)
            .collect()
    }

    fn assignments(&self) -> Vec<(PatchField, Value)> {
        let mut assignments = Vec::new();
        if let Some(phone) = self.phone.as_ref() {
            assignments.push((PatchField::Phone, Value::Text(phone.clone())));
        }
        if let Some(email) = self.email.as_ref() {
            assignments.push((PatchField::Email, Value::Text(email.clone())));
        }
        if let Some(birthday) = self.birthday {
            assignments.push((PatchField::Birthday, Value::Text(format_birthday(birthday))));
        }
        assignments
    }

    /// Builds the `SET` list, numbered from `?1`, and its bind values.
    pub(crate) fn to_set_clause(&self) -> (String, Vec<Value>) {
        let mut columns = Vec::new();
        let mut bind_values = Vec::new();
        for (index, (field, value)) in self.assignments().into_iter().enumerate() {
            columns.push(format!("{} = ?{}", field.column(), index + 1));
            bind_values.push(value);
        }
        (columns.join(", "), bind_values)
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '%' || ch == '_' || ch == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[Value]) -> Vec<String> {
        values
            .iter()
            .map(|value| match value {
                Value::Text(text) => text.clone(),
                other => panic!("unexpected bind value: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (sql, values) = ContactFilter::new().to_where_clause(1);
        assert!(sql.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn exact_filter_binds_normalized_values() {
        let filter = ContactFilter::new().name("karl").surname("MARX");
        let (sql, values) = filter.to_where_clause(1);
        assert_eq!(sql, " WHERE NAME = ?1 AND SURNAME = ?2");
        assert_eq!(texts(&values), vec!["Karl", "Marx"]);
    }

    #[test]
    fn partial_mode_rewrites_every_condition() {
        let filter = ContactFilter::new().name("mar").surname("en").partial();
        let (sql, values) = filter.to_where_clause(1);
        assert_eq!(
            sql,
            " WHERE NAME LIKE ?1 ESCAPE '\\' AND SURNAME LIKE ?2 ESCAPE '\\'"
        );
        assert_eq!(texts(&values), vec!["%Mar%", "%En%"]);
    }

    #[test]
    fn partial_mode_escapes_wildcards_in_values() {
        let filter = ContactFilter::new().surname("50%_off").partial();
        let (_, values) = filter.to_where_clause(1);
        assert_eq!(texts(&values), vec!["%50\\%\\_off%"]);
    }

    #[test]
    fn placeholders_continue_after_offset() {
        let key = ContactKey::new("karl", "marx");
        let (sql, _) = ContactFilter::by_key(&key).to_where_clause(3);
        assert_eq!(sql, " WHERE NAME = ?3 AND SURNAME = ?4");
    }

    #[test]
    fn patch_set_clause_covers_only_supplied_fields() {
        let patch = ContactPatch {
            email: Some("karl@example.org".to_string()),
            birthday: NaiveDate::from_ymd_opt(1818, 5, 5),
            ..ContactPatch::default()
        };
        let (sql, values) = patch.to_set_clause();
        assert_eq!(sql, "EMAIL = ?1, BIRTHDAY = ?2");
        assert_eq!(texts(&values), vec!["karl@example.org", "1818-05-05"]);
        assert_eq!(patch.fields(), vec![PatchField::Email, PatchField::Birthday]);
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(ContactPatch::default().is_empty());
        assert!(ContactPatch::default().to_set_clause().0.is_empty());
    }
}
