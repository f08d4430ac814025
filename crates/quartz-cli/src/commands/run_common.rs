//! Shared setup for exec and trace: load, resolve, bind natives.

use std::path::PathBuf;

use quartz_bytecode::{CompiledUnit, RoutineId};
use quartz_vm::{ConstantPool, FuelLimits, NativeRegistry, VM, Value};

use super::unit_loader::{LoadError, load_unit, parse_arg, resolve_routine};

/// What to run and under which limits.
pub struct RunInput {
    pub unit_path: PathBuf,
    pub routine: Option<String>,
    pub args: Vec<String>,
    pub limits: FuelLimits,
}

pub struct PreparedRun {
    pub unit: CompiledUnit,
    pub pool: ConstantPool,
    pub routine: RoutineId,
    pub args: Vec<Value>,
}

/// Load and resolve everything, exiting with status 1 on failure.
pub fn prepare(input: &RunInput) -> PreparedRun {
    try_prepare(input).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn try_prepare(input: &RunInput) -> Result<PreparedRun, LoadError> {
    let unit = load_unit(&input.unit_path)?;
    let routine = resolve_routine(&unit, input.routine.as_deref())?;
    let args = input
        .args
        .iter()
        .map(|text| parse_arg(text))
        .collect::<Result<Vec<_>, _>>()?;
    let pool = ConstantPool::for_unit(&unit).map_err(LoadError::Pool)?;
    Ok(PreparedRun {
        unit,
        pool,
        routine,
        args,
    })
}

/// Build a VM with the CLI's native set, exiting with status 1 if the unit
/// needs a native the CLI does not provide.
pub fn build_vm<'u, 'p>(
    unit: &'u CompiledUnit,
    pool: &'p mut ConstantPool,
    limits: FuelLimits,
) -> VM<'u, 'p> {
    VM::builder(unit, pool)
        .natives(&builtin_natives())
        .limits(limits)
        .build()
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        })
}

/// Natives every unit run from the CLI can bind.
///
/// `print` writes its arguments to stderr, keeping stdout for the result.
pub fn builtin_natives() -> NativeRegistry {
    let mut natives = NativeRegistry::new();
    natives.register("print", |call| {
        let line: Vec<_> = call.args.iter().map(ToString::to_string).collect();
        eprintln!("{}", line.join(" "));
        Ok(Value::Void)
    });
    natives
}
