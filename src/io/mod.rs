//! XML boundary (§6): reading the `Network`/`ScheduleConfiguration` documents,
//! writing (and, for the round-trip property, re-reading) the `Schedule`
//! document, and the tuning-mode parameter search and its JSON dump.

pub mod config;
pub mod network;
pub mod schedule;
pub mod tuning;
