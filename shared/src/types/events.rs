//! Event type definitions for trace telemetry
//!
//! These types describe what callers submit (`Entry`), what queries return
//! (`Event`) and how reads and deletes are scoped (`Filter`).

use serde::{Deserialize, Serialize};

/// A single named numeric measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl Event {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// A caller-submitted group of events sharing one origin and trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Service, host or component that emitted the events
    pub origin: String,

    /// Trace the events belong to
    pub trace_id: String,

    #[serde(default)]
    pub events: Vec<Event>,
}

impl Entry {
    pub fn new(origin: impl Into<String>, trace_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            origin: origin.into(),
            trace_id: trace_id.into(),
            events,
        }
    }
}

/// Optional-field match specification for queries and deletes.
///
/// `None` means "any value". An empty string is treated the same as `None`
/// by the wire layer before it reaches the filter translator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    /// True when no field is set (matches every record).
    pub fn is_empty(&self) -> bool {
        self.trace_id.is_none() && self.origin.is_none() && self.event_name.is_none()
    }
}
