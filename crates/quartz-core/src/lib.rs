#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures shared by the Quartz bytecode and VM crates.
//!
//! Two pieces live here:
//! - **Type table**: already-resolved foreign types (scalars, structs,
//!   unions, pointers, procs) as handed over by the front-end
//! - **Colors**: optional ANSI palette for disassembly and traces

mod colors;
mod types;

#[cfg(test)]
mod types_tests;

pub use colors::Colors;
pub use types::{ScalarKind, TypeDef, TypeError, TypeId, TypeTable};
