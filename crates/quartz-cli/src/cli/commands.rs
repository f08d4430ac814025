//! Command builders for the CLI.
//!
//! dump/exec/trace share one flag set: every command accepts every flag,
//! and the ones it ignores are hidden from `--help`.

use clap::Command;

use super::args::*;

/// Add hidden run args (for commands that don't execute).
fn with_hidden_run_args(cmd: Command) -> Command {
    cmd.arg(routine_arg().hide(true))
        .arg(arg_arg().hide(true))
        .arg(fuel_arg().hide(true))
        .arg(recursion_limit_arg().hide(true))
}

/// Add hidden exec output args (for commands that don't print JSON).
fn with_hidden_exec_args(cmd: Command) -> Command {
    cmd.arg(compact_arg().hide(true))
}

/// Add hidden trace args (for commands that don't trace).
fn with_hidden_trace_args(cmd: Command) -> Command {
    cmd.arg(verbose_arg().hide(true))
        .arg(no_result_arg().hide(true))
}

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("quartz")
        .about("Inspect and run compiled Quartz units")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(dump_command())
        .subcommand(exec_command())
        .subcommand(trace_command())
}

/// Show the unit's types, routines, constants and disassembly.
pub fn dump_command() -> Command {
    let cmd = Command::new("dump")
        .about("Show a compiled unit and its disassembly")
        .after_help(
            r#"EXAMPLES:
  quartz dump main.qz                 # binary unit
  quartz dump main.json --color never # JSON unit, plain text"#,
        )
        .arg(unit_path_arg())
        .arg(color_arg());

    with_hidden_trace_args(with_hidden_exec_args(with_hidden_run_args(cmd)))
}

/// Run a routine and print its result as JSON.
pub fn exec_command() -> Command {
    let cmd = Command::new("exec")
        .about("Run a routine and print its result as JSON")
        .after_help(
            r#"EXAMPLES:
  quartz exec main.qz                     # run the entry routine
  quartz exec main.qz --routine sum --arg 10
  quartz exec main.qz --fuel 500 --compact"#,
        )
        .arg(unit_path_arg())
        .arg(routine_arg())
        .arg(arg_arg())
        .arg(compact_arg())
        .arg(fuel_arg())
        .arg(recursion_limit_arg())
        .arg(color_arg().hide(true));

    with_hidden_trace_args(cmd)
}

/// Run a routine and print every executed instruction.
pub fn trace_command() -> Command {
    let cmd = Command::new("trace")
        .about("Trace a routine's execution")
        .after_help(
            r#"EXAMPLES:
  quartz trace main.qz                    # trace the entry routine
  quartz trace main.qz --routine sum --arg 3 -v
  quartz trace main.qz --no-result"#,
        )
        .arg(unit_path_arg())
        .arg(routine_arg())
        .arg(arg_arg())
        .arg(verbose_arg())
        .arg(no_result_arg())
        .arg(fuel_arg())
        .arg(recursion_limit_arg())
        .arg(color_arg());

    with_hidden_exec_args(cmd)
}
