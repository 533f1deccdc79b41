//! Constraint-model builder and solver adapter for time-triggered network
//! scheduling: given a network topology, a set of periodic frames and their
//! paths, and a configuration, produce per-instance, per-replica start times
//! for every frame on every link it traverses such that no two frames ever
//! contend for the same link at the same time.
//!
//! [`model`] holds the data model (links, paths, frames, offsets); [`builder`]
//! emits the constraint model against a [`solver::SolverBackend`] in the fixed
//! stage order documented there; [`io`] reads/writes the XML document
//! boundary; [`driver`] wires the whole pipeline together.

pub mod builder;
pub mod driver;
pub mod error;
pub mod io;
pub mod model;
pub mod solver;
