//! Tracing infrastructure for debugging VM execution.
//!
//! `NoopTracer` methods are `#[inline(always)]` and empty, so a VM run
//! with it compiles down to the bare loop. `PrintTracer` collects lines and
//! formats instructions with the disassembler's own formatter, so a trace
//! and a `dump` of the same code always agree.

use quartz_bytecode::{CompiledUnit, Instruction, NativeId, RoutineId, format_instruction};
use quartz_core::Colors;

use super::value::Value;

/// Tracer trait for VM execution instrumentation.
///
/// Methods receive raw ids; name resolution happens in the implementation.
pub trait Tracer {
    /// Called before executing an instruction.
    fn trace_instruction(&mut self, instr: &Instruction);

    /// Called after a frame for `routine` is pushed.
    fn trace_call(&mut self, routine: RoutineId);

    /// Called after a frame is popped, with the value it returned.
    fn trace_return(&mut self, value: &Value);

    /// Called when a constant's initializer is about to run.
    fn trace_const_init(&mut self, offset: u32);

    /// Called when a constant's value has been stored and its flag set.
    fn trace_const_ready(&mut self, offset: u32);

    /// Called when a constant read finds the flag already set.
    fn trace_const_hit(&mut self, offset: u32);

    /// Called before invoking a native callback.
    fn trace_native(&mut self, native: NativeId);

    /// Called after `MALLOC` allocates a block.
    fn trace_alloc(&mut self, address: u64, size: usize);
}

/// No-op tracer that gets optimized away completely.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_instruction(&mut self, _instr: &Instruction) {}

    #[inline(always)]
    fn trace_call(&mut self, _routine: RoutineId) {}

    #[inline(always)]
    fn trace_return(&mut self, _value: &Value) {}

    #[inline(always)]
    fn trace_const_init(&mut self, _offset: u32) {}

    #[inline(always)]
    fn trace_const_ready(&mut self, _offset: u32) {}

    #[inline(always)]
    fn trace_const_hit(&mut self, _offset: u32) {}

    #[inline(always)]
    fn trace_native(&mut self, _native: NativeId) {}

    #[inline(always)]
    fn trace_alloc(&mut self, _address: u64, _size: usize) {}
}

/// Detail level of a [`PrintTracer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Instructions, calls, returns and constant initialization.
    #[default]
    Default,
    /// Also constant cache hits, native calls and allocations.
    Verbose,
}

/// Tracer that collects an indented execution log.
///
/// ```text
/// main:
///   0000 CONST_GET 0 (flag@0 data@1)
///   const ANSWER @0: init
///   answer:
///     0015 PUSH_I64 42
///     0024 RETURN
///     => 42
///   const ANSWER @0: ready
/// ```
pub struct PrintTracer<'u> {
    unit: &'u CompiledUnit,
    lines: Vec<String>,
    depth: usize,
    colors: Colors,
    verbosity: Verbosity,
}

impl<'u> PrintTracer<'u> {
    pub fn new(unit: &'u CompiledUnit, colors: Colors) -> Self {
        Self {
            unit,
            lines: Vec::new(),
            depth: 0,
            colors,
            verbosity: Verbosity::Default,
        }
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    fn verbose(&self) -> bool {
        self.verbosity >= Verbosity::Verbose
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines, newline-terminated.
    pub fn output(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Print all trace lines.
    pub fn print(&self) {
        print!("{}", self.output());
    }

    fn push(&mut self, content: String) {
        let indent = "  ".repeat(self.depth);
        self.lines.push(format!("{indent}{content}"));
    }

    fn const_name(&self, offset: u32) -> &str {
        self.unit
            .constants
            .iter()
            .find(|c| c.offset == offset)
            .map_or("?", |c| c.name.as_str())
    }

    fn const_line(&mut self, offset: u32, state: &str) {
        let c = self.colors;
        let name = self.const_name(offset).to_string();
        self.push(format!("{}const {name} @{offset}: {state}{}", c.dim, c.reset));
    }
}

impl Tracer for PrintTracer<'_> {
    fn trace_instruction(&mut self, instr: &Instruction) {
        let node = self.unit.source_map.get(instr.ip);
        let line = format_instruction(instr, node, self.colors);
        self.push(line);
    }

    fn trace_call(&mut self, routine: RoutineId) {
        let c = self.colors;
        let name = self
            .unit
            .routines
            .get(routine.0 as usize)
            .map_or("?", |r| r.name.as_str());
        let line = format!("{}{name}{}:", c.blue, c.reset);
        self.push(line);
        self.depth += 1;
    }

    fn trace_return(&mut self, value: &Value) {
        let c = self.colors;
        self.push(format!("=> {}{value}{}", c.green, c.reset));
        self.depth = self.depth.saturating_sub(1);
    }

    fn trace_const_init(&mut self, offset: u32) {
        self.const_line(offset, "init");
    }

    fn trace_const_ready(&mut self, offset: u32) {
        self.const_line(offset, "ready");
    }

    fn trace_const_hit(&mut self, offset: u32) {
        if self.verbose() {
            self.const_line(offset, "cached");
        }
    }

    fn trace_native(&mut self, native: NativeId) {
        if !self.verbose() {
            return;
        }
        let name = self
            .unit
            .natives
            .get(native.0 as usize)
            .map_or("?", |n| n.as_str())
            .to_string();
        self.push(format!("native {name}"));
    }

    fn trace_alloc(&mut self, address: u64, size: usize) {
        if !self.verbose() {
            return;
        }
        self.push(format!("alloc {size} bytes at 0x{address:x}"));
    }
}
