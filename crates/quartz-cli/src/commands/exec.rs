//! Run a routine and print its result as JSON.

use super::run_common::{self, PreparedRun, RunInput};

pub struct ExecArgs {
    pub input: RunInput,
    pub pretty: bool,
}

pub fn run(args: ExecArgs) {
    let PreparedRun {
        unit,
        mut pool,
        routine,
        args: values,
    } = run_common::prepare(&args.input);

    let mut vm = run_common::build_vm(&unit, &mut pool, args.input.limits);
    let value = vm.execute(routine, &values).unwrap_or_else(|e| {
        eprintln!("runtime error: {e}");
        std::process::exit(2);
    });

    let output = if args.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };

    match output {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("error: JSON serialization failed: {e}");
            std::process::exit(1);
        }
    }
}
