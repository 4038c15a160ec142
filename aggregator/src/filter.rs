//! Filter translation
//!
//! Turns a [`Filter`] into a backend-neutral [`Predicate`]: a conjunction of
//! column equality clauses. Backends either render it to a `WHERE` clause
//! with bind parameters or evaluate it directly against rows.

use crate::error::{AggregatorError, Result};
use spanstat_shared::Filter;

/// Longest value accepted for any filter field, in bytes.
pub const MAX_FILTER_VALUE_LEN: usize = 1024;

/// Filterable columns of the events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    TraceId,
    Origin,
    Event,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::TraceId => "trace_id",
            Column::Origin => "origin",
            Column::Event => "event",
        }
    }
}

/// Conjunction of `column = value` clauses. Empty matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<(Column, String)>,
}

impl Predicate {
    pub fn clauses(&self) -> &[(Column, String)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render as a SQL `WHERE` clause using `?` placeholders, plus the values
    /// to bind in order. Empty predicates render to an empty string.
    pub fn to_sql(&self) -> (String, Vec<&str>) {
        if self.clauses.is_empty() {
            return (String::new(), Vec::new());
        }
        let conditions: Vec<String> = self
            .clauses
            .iter()
            .map(|(column, _)| format!("{} = ?", column.as_str()))
            .collect();
        let binds = self.clauses.iter().map(|(_, v)| v.as_str()).collect();
        (format!("WHERE {}", conditions.join(" AND ")), binds)
    }

    /// Evaluate against a row's column values.
    pub fn matches(&self, trace_id: &str, origin: &str, event: &str) -> bool {
        self.clauses.iter().all(|(column, value)| {
            let actual = match column {
                Column::TraceId => trace_id,
                Column::Origin => origin,
                Column::Event => event,
            };
            actual == value
        })
    }
}

/// Translate a filter into a predicate.
///
/// Set fields must be non-blank, at most [`MAX_FILTER_VALUE_LEN`] bytes and
/// free of control characters.
pub fn to_predicate(filter: &Filter) -> Result<Predicate> {
    let mut clauses = Vec::with_capacity(3);
    for (column, value) in [
        (Column::TraceId, &filter.trace_id),
        (Column::Origin, &filter.origin),
        (Column::Event, &filter.event_name),
    ] {
        if let Some(value) = value {
            validate_value(column, value)?;
            clauses.push((column, value.clone()));
        }
    }
    Ok(Predicate { clauses })
}

fn validate_value(column: Column, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AggregatorError::InvalidFilter(format!(
            "{} must not be blank",
            column.as_str()
        )));
    }
    if value.len() > MAX_FILTER_VALUE_LEN {
        return Err(AggregatorError::InvalidFilter(format!(
            "{} exceeds {} bytes",
            column.as_str(),
            MAX_FILTER_VALUE_LEN
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(AggregatorError::InvalidFilter(format!(
            "{} contains control characters",
            column.as_str()
        )));
    }
    Ok(())
}
