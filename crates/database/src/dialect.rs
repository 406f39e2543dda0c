//! SQL dialect hooks.
//!
//! Everything that differs between storage engines at the SQL-text level lives
//! behind the [`Dialect`] trait: placeholder style, the spelling of the
//! "excluded" pseudo-row in conflict resolution, column type names and the
//! current-timestamp expression. The upsert statement itself is assembled once,
//! here, from those hooks.

use crate::error::DbError;
use crate::registry::BackendKind;
use crate::schema::ColumnType;
use std::fmt;

/// Describes an insert-or-update against one table.
#[derive(Debug, Clone, Copy)]
pub struct UpsertTarget<'a> {
    pub table: &'a str,
    /// Columns supplied by every row, in row order.
    pub columns: &'a [&'a str],
    /// The natural key; must be a subset of `columns` and backed by a unique constraint.
    pub conflict_columns: &'a [&'a str],
    /// Columns not supplied by the rows that are reset to the current timestamp
    /// whenever an existing row is overwritten.
    pub touch_columns: &'a [&'a str],
}

impl<'a> UpsertTarget<'a> {
    pub const fn new(
        table: &'a str,
        columns: &'a [&'a str],
        conflict_columns: &'a [&'a str],
    ) -> Self {
        Self {
            table,
            columns,
            conflict_columns,
            touch_columns: &[],
        }
    }

    pub const fn touching(self, touch_columns: &'a [&'a str]) -> Self {
        Self {
            touch_columns,
            ..self
        }
    }

    /// Columns overwritten on conflict: everything that is not part of the key.
    pub fn update_columns(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|c| !self.conflict_columns.contains(c))
    }

    pub(crate) fn validate(&self) -> Result<(), DbError> {
        validate_identifier(self.table)?;
        if self.columns.is_empty() {
            return Err(DbError::InvalidUpsert(format!(
                "no columns given for table '{}'",
                self.table
            )));
        }
        if self.conflict_columns.is_empty() {
            return Err(DbError::InvalidUpsert(format!(
                "no conflict columns given for table '{}'",
                self.table
            )));
        }
        for column in self
            .columns
            .iter()
            .chain(self.conflict_columns)
            .chain(self.touch_columns)
        {
            validate_identifier(column)?;
        }
        if let Some(missing) = self
            .conflict_columns
            .iter()
            .find(|c| !self.columns.contains(*c))
        {
            return Err(DbError::InvalidUpsert(format!(
                "conflict column '{missing}' is not among the inserted columns"
            )));
        }
        if let Some(clash) = self.touch_columns.iter().find(|c| self.columns.contains(*c)) {
            return Err(DbError::InvalidUpsert(format!(
                "touch column '{clash}' is also an inserted column"
            )));
        }
        Ok(())
    }
}

/// The per-backend SQL hooks.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// The bind placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// How the incoming row is referenced inside `DO UPDATE SET`.
    fn excluded(&self, column: &str) -> String;

    fn column_type(&self, ty: ColumnType) -> String;

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Comma-separated placeholders `1..=count`.
    fn placeholders(&self, count: usize) -> String {
        (1..=count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Renders the single-row `INSERT ... ON CONFLICT` statement for `target`.
    ///
    /// Both supported engines accept the `ON CONFLICT (...) DO UPDATE` form, so
    /// only the placeholder and excluded-row spelling vary.
    fn upsert_sql(&self, target: &UpsertTarget<'_>) -> Result<String, DbError> {
        target.validate()?;

        let assignments: Vec<String> = target
            .update_columns()
            .map(|c| format!("{c} = {}", self.excluded(c)))
            .chain(
                target
                    .touch_columns
                    .iter()
                    .map(|c| format!("{c} = {}", self.current_timestamp())),
            )
            .collect();

        let action = if assignments.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", assignments.join(", "))
        };

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            target.table,
            target.columns.join(", "),
            self.placeholders(target.columns.len()),
            target.conflict_columns.join(", "),
            action
        ))
    }

    fn insert_sql(&self, table: &str, columns: &[&str]) -> Result<String, DbError> {
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(column)?;
        }
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            self.placeholders(columns.len())
        ))
    }
}

/// Table and column names are interpolated into SQL text, so only plain
/// identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn excluded(&self, column: &str) -> String {
        format!("excluded.{column}")
    }

    // Decimals and dates are kept as TEXT: a NUMERIC affinity column would
    // silently coerce "0.86" into a binary float.
    fn column_type(&self, ty: ColumnType) -> String {
        match ty {
            ColumnType::Integer | ColumnType::BigInt => "INTEGER".to_string(),
            ColumnType::Text | ColumnType::Varchar(_) => "TEXT".to_string(),
            ColumnType::Decimal { .. } => "TEXT".to_string(),
            ColumnType::Date | ColumnType::Timestamp => "TEXT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn excluded(&self, column: &str) -> String {
        format!("EXCLUDED.{column}")
    }

    fn column_type(&self, ty: ColumnType) -> String {
        match ty {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(len) => format!("VARCHAR({len})"),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({precision},{scale})"),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}
