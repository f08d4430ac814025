pub mod dump;
pub mod exec;
pub mod run_common;
pub mod trace;
pub mod unit_loader;

#[cfg(test)]
mod run_common_tests;
#[cfg(test)]
mod unit_loader_tests;
