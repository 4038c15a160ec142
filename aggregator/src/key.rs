//! Aggregation key and merge rule shared by the write and read paths.
//!
//! An [`AggregationKey`] is the `(origin, trace_id, name, unit)` identity of
//! one measurement series. Values under the same key are summed, both in the
//! write-back buffer and when re-aggregating stored rows for a query, so the
//! total for a key is the same whether its events are still buffered or
//! already flushed.
//!
//! The key is kept structured in memory. [`AggregationKey::encode`] produces a
//! flat `origin:trace_id:name:unit` string for logs and external maps; `\` and
//! `:` inside fields are backslash-escaped so [`AggregationKey::decode`] always
//! recovers the original fields.

use spanstat_shared::{Entry, Event};
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

const SEPARATOR: char = ':';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregationKey {
    pub origin: String,
    pub trace_id: String,
    pub name: String,
    pub unit: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyDecodeError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),
    #[error("dangling escape at end of key")]
    DanglingEscape,
    #[error("unknown escape sequence '\\{0}'")]
    UnknownEscape(char),
}

impl AggregationKey {
    pub fn new(
        origin: impl Into<String>,
        trace_id: impl Into<String>,
        name: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            trace_id: trace_id.into(),
            name: name.into(),
            unit: unit.into(),
        }
    }

    /// Key for one event of a submitted entry.
    pub fn for_event(entry: &Entry, event: &Event) -> Self {
        Self::new(&entry.origin, &entry.trace_id, &event.name, &event.unit)
    }

    /// Flat, escaped string form.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(
            self.origin.len() + self.trace_id.len() + self.name.len() + self.unit.len() + 3,
        );
        for (i, field) in [&self.origin, &self.trace_id, &self.name, &self.unit]
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                out.push(SEPARATOR);
            }
            for c in field.chars() {
                if c == SEPARATOR || c == ESCAPE {
                    out.push(ESCAPE);
                }
                out.push(c);
            }
        }
        out
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode(s: &str) -> Result<Self, KeyDecodeError> {
        let mut fields: Vec<String> = Vec::with_capacity(4);
        let mut current = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => match chars.next() {
                    Some(next) if next == SEPARATOR || next == ESCAPE => current.push(next),
                    Some(other) => return Err(KeyDecodeError::UnknownEscape(other)),
                    None => return Err(KeyDecodeError::DanglingEscape),
                },
                SEPARATOR => fields.push(std::mem::take(&mut current)),
                c => current.push(c),
            }
        }
        fields.push(current);

        if fields.len() != 4 {
            return Err(KeyDecodeError::FieldCount(fields.len()));
        }
        let unit = fields.pop().unwrap_or_default();
        let name = fields.pop().unwrap_or_default();
        let trace_id = fields.pop().unwrap_or_default();
        let origin = fields.pop().unwrap_or_default();
        Ok(Self {
            origin,
            trace_id,
            name,
            unit,
        })
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Running sums keyed by [`AggregationKey`].
///
/// Merging is plain addition, so the final value for a key does not depend on
/// the order or grouping in which values arrive.
#[derive(Debug, Clone, Default)]
pub struct AggregateMap {
    sums: HashMap<AggregationKey, f64>,
}

impl AggregateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sums: HashMap::with_capacity(capacity),
        }
    }

    /// Add `value` to the running sum for `key`, inserting it if absent.
    pub fn merge(&mut self, key: AggregationKey, value: f64) {
        match self.sums.entry(key) {
            MapEntry::Occupied(mut slot) => *slot.get_mut() += value,
            MapEntry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    /// Merge every event of an entry.
    pub fn merge_entry(&mut self, entry: &Entry) {
        for event in &entry.events {
            self.merge(AggregationKey::for_event(entry, event), event.value);
        }
    }

    /// Fold another map into this one.
    pub fn absorb(&mut self, other: AggregateMap) {
        for (key, value) in other.sums {
            self.merge(key, value);
        }
    }

    pub fn get(&self, key: &AggregationKey) -> Option<f64> {
        self.sums.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregationKey, f64)> {
        self.sums.iter().map(|(k, v)| (k, *v))
    }

    /// Collapse into events ordered by name, then unit.
    ///
    /// Origin and trace are dropped: callers use this where they are fixed by
    /// the query filter.
    pub fn into_sorted_events(self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .sums
            .into_iter()
            .map(|(key, value)| Event {
                name: key.name,
                value,
                unit: key.unit,
            })
            .collect();
        events.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.unit.cmp(&b.unit)));
        events
    }
}

impl IntoIterator for AggregateMap {
    type Item = (AggregationKey, f64);
    type IntoIter = std::collections::hash_map::IntoIter<AggregationKey, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.sums.into_iter()
    }
}
