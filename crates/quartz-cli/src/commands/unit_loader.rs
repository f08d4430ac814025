//! Loading units and turning command-line text into routine inputs.

use std::path::Path;

use quartz_bytecode::{CompiledUnit, RoutineId, UnitError};
use quartz_vm::{RuntimeError, Value};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Unit { path: String, source: UnitError },
    #[error("unit has no routine named `{0}`")]
    UnknownRoutine(String),
    #[error("unit has no entry routine; pass --routine")]
    NoEntry,
    #[error("invalid argument `{0}`: expected an integer, float, true or false")]
    InvalidArg(String),
    #[error("cannot prepare constants: {0}")]
    Pool(RuntimeError),
}

/// Load a unit from a binary container or a JSON file.
pub fn load_unit(path: &Path) -> Result<CompiledUnit, LoadError> {
    CompiledUnit::from_path(path).map_err(|source| LoadError::Unit {
        path: path.display().to_string(),
        source,
    })
}

/// `--routine NAME`, or the unit's entry routine when absent.
pub fn resolve_routine(unit: &CompiledUnit, name: Option<&str>) -> Result<RoutineId, LoadError> {
    match name {
        Some(name) => unit
            .routine_by_name(name)
            .ok_or_else(|| LoadError::UnknownRoutine(name.to_string())),
        None => unit.entry.ok_or(LoadError::NoEntry),
    }
}

/// Parse one `--arg`. Integers become signed values, so the VM narrows
/// them to whatever the parameter type is.
pub fn parse_arg(text: &str) -> Result<Value, LoadError> {
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(v) = text.parse::<i64>() {
        return Ok(Value::Int(v));
    }
    if let Ok(v) = text.parse::<u64>() {
        return Ok(Value::UInt(v));
    }
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| LoadError::InvalidArg(text.to_string()))
}
