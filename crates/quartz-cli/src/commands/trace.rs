//! Trace routine execution for debugging.

use quartz_core::Colors;
use quartz_vm::{PrintTracer, Verbosity};

use super::run_common::{self, PreparedRun, RunInput};

pub struct TraceArgs {
    pub input: RunInput,
    pub verbosity: Verbosity,
    pub no_result: bool,
    pub color: bool,
}

pub fn run(args: TraceArgs) {
    let PreparedRun {
        unit,
        mut pool,
        routine,
        args: values,
    } = run_common::prepare(&args.input);

    let mut vm = run_common::build_vm(&unit, &mut pool, args.input.limits);
    let colors = Colors::new(args.color);
    let mut tracer = PrintTracer::new(&unit, colors).verbosity(args.verbosity);

    let value = match vm.execute_with(routine, &values, &mut tracer) {
        Ok(value) => {
            tracer.print();
            value
        }
        Err(e) => {
            tracer.print();
            eprintln!("runtime error: {e}");
            std::process::exit(2);
        }
    };

    if args.no_result {
        return;
    }

    println!("{}---{}", colors.dim, colors.reset);
    println!("{value}");
}
