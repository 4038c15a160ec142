//! Domain types

pub mod events;
