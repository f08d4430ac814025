//! Dispatch logic: extract params from ArgMatches and convert to command args.
//!
//! - `*Params` structs mirror command `*Args` but are populated from clap
//! - `from_matches()` extractors pull the relevant fields, ignoring hidden ones
//! - `From<*Params>` impls bridge dispatch to the command handlers

use std::path::PathBuf;

use clap::ArgMatches;

use quartz_vm::{FuelLimits, Verbosity};

use super::ColorChoice;
use crate::commands::dump::DumpArgs;
use crate::commands::exec::ExecArgs;
use crate::commands::run_common::RunInput;
use crate::commands::trace::TraceArgs;

pub struct DumpParams {
    pub unit_path: PathBuf,
    pub color: ColorChoice,
}

impl DumpParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            unit_path: unit_path(m),
            color: parse_color(m),
        }
    }
}

impl From<DumpParams> for DumpArgs {
    fn from(p: DumpParams) -> Self {
        Self {
            unit_path: p.unit_path,
            color: p.color.should_colorize(),
        }
    }
}

/// Inputs shared by exec and trace.
pub struct RunParams {
    pub unit_path: PathBuf,
    pub routine: Option<String>,
    pub args: Vec<String>,
    pub fuel: u32,
    pub recursion_limit: u32,
}

impl RunParams {
    fn from_matches(m: &ArgMatches) -> Self {
        Self {
            unit_path: unit_path(m),
            routine: m.get_one::<String>("routine").cloned(),
            args: m
                .get_many::<String>("arg")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            fuel: m.get_one::<u32>("fuel").copied().unwrap_or(1_000_000),
            recursion_limit: m.get_one::<u32>("recursion_limit").copied().unwrap_or(1024),
        }
    }
}

impl From<RunParams> for RunInput {
    fn from(p: RunParams) -> Self {
        Self {
            unit_path: p.unit_path,
            routine: p.routine,
            args: p.args,
            limits: FuelLimits::new()
                .exec_fuel(p.fuel)
                .recursion_limit(p.recursion_limit),
        }
    }
}

pub struct ExecParams {
    pub run: RunParams,
    pub compact: bool,
    // color, verbose and no_result are parsed but not extracted (unified flags)
}

impl ExecParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            run: RunParams::from_matches(m),
            compact: m.get_flag("compact"),
        }
    }
}

impl From<ExecParams> for ExecArgs {
    fn from(p: ExecParams) -> Self {
        // Pretty by default when stdout is a TTY, unless --compact is passed
        let pretty = !p.compact && std::io::IsTerminal::is_terminal(&std::io::stdout());

        Self {
            input: p.run.into(),
            pretty,
        }
    }
}

pub struct TraceParams {
    pub run: RunParams,
    pub verbose: u8,
    pub no_result: bool,
    pub color: ColorChoice,
    // compact is parsed but not extracted (unified flag)
}

impl TraceParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            run: RunParams::from_matches(m),
            verbose: m.get_count("verbose"),
            no_result: m.get_flag("no_result"),
            color: parse_color(m),
        }
    }
}

impl From<TraceParams> for TraceArgs {
    fn from(p: TraceParams) -> Self {
        let verbosity = match p.verbose {
            0 => Verbosity::Default,
            _ => Verbosity::Verbose,
        };

        Self {
            input: p.run.into(),
            verbosity,
            no_result: p.no_result,
            color: p.color.should_colorize(),
        }
    }
}

fn unit_path(m: &ArgMatches) -> PathBuf {
    m.get_one::<PathBuf>("unit_path")
        .cloned()
        .unwrap_or_default()
}

/// Parse --color flag into ColorChoice.
fn parse_color(m: &ArgMatches) -> ColorChoice {
    match m.get_one::<String>("color").map(|s| s.as_str()) {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}
