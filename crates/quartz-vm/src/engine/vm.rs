//! Virtual machine for executing compiled Quartz units.

use std::sync::Arc;

use quartz_bytecode::{
    CompiledUnit, Instruction, NativeId, Opcode, Routine, RoutineId, decode_one, unpack_cast,
};
use quartz_core::{ScalarKind, TypeId};

use super::aggregate::ExternAggregate;
use super::constants::ConstantPool;
use super::error::RuntimeError;
use super::frame::{Frame, FrameKind, FrameLayout, FrameStack, Slot};
use super::layout::{Shape, TypeLayouts};
use super::memory::{Memory, offset_address};
use super::pointer::ExternPointer;
use super::proc::{NativeCall, NativeFn, NativeRegistry, ProcRef, ProcTarget};
use super::trace::{NoopTracer, Tracer};
use super::value::{Value, coerce, mismatch, read_value, write_value, zero_value};

/// Runtime limits for execution.
#[derive(Clone, Copy, Debug)]
pub struct FuelLimits {
    /// Maximum total instructions (default: 1,000,000).
    pub(crate) exec_fuel: u32,
    /// Maximum call depth (default: 1,024).
    pub(crate) recursion_limit: u32,
}

impl Default for FuelLimits {
    fn default() -> Self {
        Self {
            exec_fuel: 1_000_000,
            recursion_limit: 1024,
        }
    }
}

impl FuelLimits {
    /// Create new fuel limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.exec_fuel = fuel;
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn get_exec_fuel(&self) -> u32 {
        self.exec_fuel
    }
    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

/// What the dispatcher does after an instruction.
enum Flow {
    Continue,
    Finished(Value),
}

/// Virtual machine state.
///
/// Heap memory survives across [`execute`](Self::execute) calls on the same
/// VM; frames and the value stack do not.
pub struct VM<'u, 'p> {
    unit: &'u CompiledUnit,
    pool: &'p mut ConstantPool,
    layouts: TypeLayouts,
    frame_layouts: Vec<FrameLayout>,
    natives: Vec<NativeFn>,
    memory: Memory,
    stack: Vec<Value>,
    frames: FrameStack,
    /// Next instruction to fetch.
    ip: u32,
    /// Instruction being executed (for diagnostics).
    instr_ip: u32,
    exec_fuel: u32,
    limits: FuelLimits,
}

/// Builder for VM instances.
pub struct VMBuilder<'u, 'p> {
    unit: &'u CompiledUnit,
    pool: &'p mut ConstantPool,
    natives: NativeRegistry,
    limits: FuelLimits,
}

impl<'u, 'p> VMBuilder<'u, 'p> {
    /// Create a new VM builder.
    pub fn new(unit: &'u CompiledUnit, pool: &'p mut ConstantPool) -> Self {
        Self {
            unit,
            pool,
            natives: NativeRegistry::new(),
            limits: FuelLimits::default(),
        }
    }

    /// Set the registry the unit's native symbols are resolved against.
    pub fn natives(mut self, registry: &NativeRegistry) -> Self {
        self.natives = registry.clone();
        self
    }

    /// Set the fuel limits.
    pub fn limits(mut self, limits: FuelLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the execution fuel limit.
    pub fn exec_fuel(mut self, fuel: u32) -> Self {
        self.limits = self.limits.exec_fuel(fuel);
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.limits = self.limits.recursion_limit(limit);
        self
    }

    /// Build the VM: lay out types and frames, and bind natives.
    pub fn build(self) -> Result<VM<'u, 'p>, RuntimeError> {
        let layouts = TypeLayouts::compute(&self.unit.types)?;
        let frame_layouts = self
            .unit
            .routines
            .iter()
            .map(|r| FrameLayout::compute(r, &layouts))
            .collect::<Result<Vec<_>, _>>()?;
        let natives = self
            .unit
            .natives
            .iter()
            .map(|name| {
                self.natives
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownNative(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VM {
            unit: self.unit,
            pool: self.pool,
            layouts,
            frame_layouts,
            natives,
            memory: Memory::new(),
            stack: Vec::new(),
            frames: FrameStack::new(),
            ip: 0,
            instr_ip: 0,
            exec_fuel: self.limits.get_exec_fuel(),
            limits: self.limits,
        })
    }
}

impl<'u, 'p> VM<'u, 'p> {
    /// Create a VM builder.
    pub fn builder(unit: &'u CompiledUnit, pool: &'p mut ConstantPool) -> VMBuilder<'u, 'p> {
        VMBuilder::new(unit, pool)
    }

    pub fn layouts(&self) -> &TypeLayouts {
        &self.layouts
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn pool(&self) -> &ConstantPool {
        self.pool
    }

    /// Run `routine` with `args` and return its result.
    ///
    /// Uses `NoopTracer`, which gets completely optimized away.
    pub fn execute(
        &mut self,
        routine: RoutineId,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        self.execute_with(routine, args, &mut NoopTracer)
    }

    /// Run `routine` with a tracer for debugging.
    pub fn execute_with<T: Tracer>(
        &mut self,
        routine: RoutineId,
        args: &[Value],
        tracer: &mut T,
    ) -> Result<Value, RuntimeError> {
        self.stack.clear();
        self.exec_fuel = self.limits.exec_fuel;

        let result = self
            .enter(routine, args.to_vec(), FrameKind::Host, tracer)
            .and_then(|()| self.run(tracer));

        if result.is_err() {
            self.unwind();
        }
        result
    }

    /// Invoke a proc value from the host.
    pub fn call_proc(&mut self, proc: ProcRef, args: &[Value]) -> Result<Value, RuntimeError> {
        match proc.target {
            None => Err(RuntimeError::NilProc),
            Some(ProcTarget::Routine(id)) if proc.context != 0 => {
                Err(RuntimeError::RoutineContext(id.0))
            }
            Some(ProcTarget::Routine(id)) => self.execute(id, args),
            Some(ProcTarget::Native(id)) => {
                self.call_native(id, args.to_vec(), proc.context, &mut NoopTracer)
            }
        }
    }

    fn run<T: Tracer>(&mut self, tracer: &mut T) -> Result<Value, RuntimeError> {
        loop {
            if self.exec_fuel == 0 {
                return Err(RuntimeError::ExecFuelExhausted(self.limits.exec_fuel));
            }
            self.exec_fuel -= 1;

            let instr = decode_one(&self.unit.code, self.ip)?;
            tracer.trace_instruction(&instr);
            self.instr_ip = instr.ip;
            self.ip = instr.next_ip;

            if let Flow::Finished(value) = self.step(&instr, tracer)? {
                return Ok(value);
            }
        }
    }

    /// Release the frames left behind by a failed execution.
    fn unwind(&mut self) {
        for frame in self.frames.drain() {
            // Blocks of live frames are always valid.
            let _ = self.memory.free(frame.locals);
        }
        self.stack.clear();
    }

    fn step<T: Tracer>(
        &mut self,
        instr: &Instruction,
        tracer: &mut T,
    ) -> Result<Flow, RuntimeError> {
        match instr.opcode {
            Opcode::Nop => {}

            Opcode::PushI64 => self.stack.push(Value::Int(instr.i64(0))),
            Opcode::PushU64 => self.stack.push(Value::UInt(instr.u64(0))),
            Opcode::PushF64 => {
                let value = f64::from_bits(instr.u64(0));
                self.stack.push(Value::Float(value));
            }
            Opcode::PushBool => self.stack.push(Value::Bool(instr.u8(0) != 0)),
            Opcode::PushZero => {
                let shape = self.layouts.shape(TypeId(instr.u16(0)))?;
                self.stack.push(zero_value(shape));
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let top = self.pop()?;
                self.stack.push(top.clone());
                self.stack.push(top);
            }
            Opcode::Swap => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(b);
                self.stack.push(a);
            }

            Opcode::LocalGet => {
                let (address, slot) = self.local(instr.u16(0))?;
                let bytes = self.memory.read(address, slot.shape.size())?;
                self.stack.push(read_value(&slot.shape, bytes));
            }
            Opcode::LocalSet => {
                let value = self.pop()?;
                let (address, slot) = self.local(instr.u16(0))?;
                let out = self.memory.slice_mut(address, slot.shape.size())?;
                write_value(&slot.shape, &value, out)?;
            }
            Opcode::LocalAddr => {
                let (address, slot) = self.local(instr.u16(0))?;
                let ptr = ExternPointer::new(address, slot.ty);
                self.stack.push(Value::Pointer(ptr));
            }

            Opcode::Add | Opcode::Sub | Opcode::Mul => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(arithmetic(instr.opcode, a, b)?);
            }
            Opcode::CmpLt => {
                let b = self.pop()?;
                let a = self.pop()?;
                let lt = match (&a, &b) {
                    (Value::Int(x), Value::Int(y)) => x < y,
                    (Value::UInt(x), Value::UInt(y)) => x < y,
                    (Value::Float(x), Value::Float(y)) => x < y,
                    _ => return Err(mismatch(a.kind_name(), &b)),
                };
                self.stack.push(Value::Bool(lt));
            }
            Opcode::CmpEq => {
                let b = self.pop()?;
                let a = self.pop()?;
                if std::mem::discriminant(&a) != std::mem::discriminant(&b) {
                    return Err(mismatch(a.kind_name(), &b));
                }
                self.stack.push(Value::Bool(a == b));
            }
            Opcode::Not => match self.pop()? {
                Value::Bool(b) => self.stack.push(Value::Bool(!b)),
                other => return Err(mismatch("bool", &other)),
            },
            Opcode::Cast => {
                let packed = instr.u8(0);
                let (from, to) = unpack_cast(packed).ok_or(RuntimeError::InvalidCast(packed))?;
                let value = self.pop()?;
                if !fits_kind(&value, from) {
                    return Err(mismatch(from.name(), &value));
                }
                self.stack.push(coerce(&Shape::Scalar(to), &value)?);
            }

            Opcode::Jump => self.ip = instr.u32(0),
            Opcode::JumpIfFalse => match self.pop()? {
                Value::Bool(false) => self.ip = instr.u32(0),
                Value::Bool(true) => {}
                other => return Err(mismatch("bool", &other)),
            },
            Opcode::Call => {
                let id = RoutineId(instr.u16(0));
                let params = self.routine(id)?.params as usize;
                let args = self.pop_n(params)?;
                self.enter(id, args, FrameKind::Call, tracer)?;
            }
            Opcode::Return => return self.ret(tracer),

            Opcode::ConstGet => self.const_get(instr.u32(0), tracer)?,

            Opcode::FieldGet => {
                let value = self.pop_aggregate(instr.u16(0))?.get(instr.u16(1))?;
                self.stack.push(value);
            }
            Opcode::FieldSet => {
                let value = self.pop()?;
                let mut aggregate = self.pop_aggregate(instr.u16(0))?;
                aggregate.set(instr.u16(1), &value)?;
                self.stack.push(Value::Aggregate(aggregate));
            }
            Opcode::FieldAddr => {
                let ty = TypeId(instr.u16(0));
                let ptr = self.pop_pointer()?;
                if ptr.pointee != ty {
                    return Err(mismatch(format!("{ty}*"), &Value::Pointer(ptr)));
                }
                let field = ptr.field(&self.layouts, instr.u16(1))?;
                self.stack.push(Value::Pointer(field));
            }
            Opcode::Load => {
                let ptr = self.pop_pointer()?;
                let ptr = ExternPointer::new(ptr.address, TypeId(instr.u16(0)));
                let value = ptr.load(&self.memory, &self.layouts)?;
                self.stack.push(value);
            }
            Opcode::Store => {
                let value = self.pop()?;
                let ptr = self.pop_pointer()?;
                let ptr = ExternPointer::new(ptr.address, TypeId(instr.u16(0)));
                ptr.store(&mut self.memory, &self.layouts, &value)?;
            }
            Opcode::Malloc => {
                let ty = TypeId(instr.u16(0));
                let size = self
                    .layouts
                    .size_of(ty)?
                    .checked_mul(instr.u32(1) as usize)
                    .ok_or(RuntimeError::AllocationTooLarge(usize::MAX))?;
                let address = self.memory.alloc(size)?;
                tracer.trace_alloc(address, size);
                self.stack.push(Value::Pointer(ExternPointer::new(address, ty)));
            }
            Opcode::PtrIndex => {
                let index = self.pop()?;
                let index = index.as_i64().ok_or_else(|| mismatch("integer", &index))?;
                let ptr = self.pop_pointer()?;
                let ptr = ExternPointer::new(ptr.address, TypeId(instr.u16(0)));
                self.stack.push(Value::Pointer(ptr.index(&self.layouts, index)?));
            }
            Opcode::ProcRef => {
                let id = RoutineId(instr.u16(0));
                self.routine(id)?;
                self.layouts.signature(TypeId(instr.u16(1)))?;
                self.stack.push(Value::Proc(ProcRef::routine(id)));
            }
            Opcode::NativeRef => {
                let id = NativeId(instr.u16(0));
                if id.0 as usize >= self.natives.len() {
                    return Err(RuntimeError::UnknownNative(format!("#{}", id.0)));
                }
                self.layouts.signature(TypeId(instr.u16(1)))?;
                self.stack.push(Value::Proc(ProcRef::native(id)));
            }
            Opcode::ProcContext => {
                let context = match self.pop()? {
                    Value::Pointer(p) => p.address,
                    other => match other.as_i64() {
                        Some(word) => word as u64,
                        None => return Err(mismatch("context word", &other)),
                    },
                };
                let mut proc = self.pop_proc()?;
                proc.context = context;
                self.stack.push(Value::Proc(proc));
            }
            Opcode::CallProc => self.call_proc_value(TypeId(instr.u16(0)), tracer)?,
        }
        Ok(Flow::Continue)
    }

    fn routine(&self, id: RoutineId) -> Result<&'u Routine, RuntimeError> {
        self.unit
            .routines
            .get(id.0 as usize)
            .ok_or(RuntimeError::UnknownRoutine(id.0))
    }

    /// Push a frame for `id`, store `args` into its leading locals, and jump
    /// to its entry.
    fn enter<T: Tracer>(
        &mut self,
        id: RoutineId,
        args: Vec<Value>,
        kind: FrameKind,
        tracer: &mut T,
    ) -> Result<(), RuntimeError> {
        let routine = self.routine(id)?;
        if self.frames.depth() >= self.limits.recursion_limit {
            return Err(RuntimeError::RecursionLimitExceeded(self.limits.recursion_limit));
        }
        if args.len() != routine.params as usize {
            return Err(RuntimeError::ArityMismatch {
                routine: routine.name.clone(),
                expected: routine.params as usize,
                got: args.len(),
            });
        }

        let layout = &self.frame_layouts[id.0 as usize];
        let locals = self.memory.alloc(layout.size)?;
        for (slot, arg) in layout.slots.iter().zip(&args) {
            let address = offset_address(locals, slot.offset as i64)?;
            let out = self.memory.slice_mut(address, slot.shape.size())?;
            if let Err(e) = write_value(&slot.shape, arg, out) {
                self.memory.free(locals)?;
                return Err(e);
            }
        }

        self.frames.push(Frame {
            routine: id,
            kind,
            return_ip: self.ip,
            locals,
            stack_base: self.stack.len(),
        });
        self.ip = routine.entry;
        tracer.trace_call(id);
        Ok(())
    }

    fn ret<T: Tracer>(&mut self, tracer: &mut T) -> Result<Flow, RuntimeError> {
        let routine = self
            .frames
            .current()
            .map(|f| f.routine)
            .ok_or(RuntimeError::StackUnderflow(self.instr_ip))?;
        let value = match self.routine(routine)?.ret {
            Some(ty) => {
                let value = self.pop()?;
                coerce(self.layouts.shape(ty)?, &value)?
            }
            None => Value::Void,
        };

        let frame = self
            .frames
            .pop()
            .ok_or(RuntimeError::StackUnderflow(self.instr_ip))?;
        self.stack.truncate(frame.stack_base);
        self.memory.free(frame.locals)?;
        tracer.trace_return(&value);

        match frame.kind {
            FrameKind::Host => return Ok(Flow::Finished(value)),
            FrameKind::Call => self.push_result(value),
            FrameKind::ProcCall { ret: Some(ty) } => {
                let value = coerce(self.layouts.shape(ty)?, &value)?;
                self.stack.push(value);
            }
            FrameKind::ProcCall { ret: None } => {}
            FrameKind::ConstInit { offset } => {
                let ty = self.pool.entry(offset)?.ty;
                let shape = self.layouts.shape(ty)?;
                let mut bytes = vec![0u8; shape.size()];
                write_value(shape, &value, &mut bytes)?;
                self.pool.store(offset, &bytes)?;
                tracer.trace_const_ready(offset);
                self.stack.push(read_value(shape, &bytes));
            }
        }
        self.ip = frame.return_ip;
        Ok(Flow::Continue)
    }

    fn const_get<T: Tracer>(&mut self, offset: u32, tracer: &mut T) -> Result<(), RuntimeError> {
        if self.pool.is_initialized(offset)? {
            let ty = self.pool.entry(offset)?.ty;
            let value = read_value(self.layouts.shape(ty)?, self.pool.data(offset)?);
            tracer.trace_const_hit(offset);
            self.stack.push(value);
            return Ok(());
        }

        let initializer = self.pool.lookup_initializer(offset)?;
        tracer.trace_const_init(offset);
        self.enter(initializer, Vec::new(), FrameKind::ConstInit { offset }, tracer)
    }

    /// `CALL_PROC ty`: stack is `[proc, arg0, .., argN-1]`.
    fn call_proc_value<T: Tracer>(
        &mut self,
        ty: TypeId,
        tracer: &mut T,
    ) -> Result<(), RuntimeError> {
        let (params, ret_ty) = self.layouts.signature(ty)?;
        let shapes = params
            .iter()
            .map(|p| self.layouts.shape(*p).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let ret = ret_ty.map(|r| self.layouts.shape(r).cloned()).transpose()?;

        let raw = self.pop_n(shapes.len())?;
        let proc = self.pop_proc()?;
        let args = shapes
            .iter()
            .zip(&raw)
            .map(|(shape, arg)| coerce(shape, arg))
            .collect::<Result<Vec<_>, _>>()?;

        match proc.target {
            None => Err(RuntimeError::NilProc),
            // Routines have no slot for a context word.
            Some(ProcTarget::Routine(id)) if proc.context != 0 => {
                Err(RuntimeError::RoutineContext(id.0))
            }
            Some(ProcTarget::Routine(id)) => {
                self.enter(id, args, FrameKind::ProcCall { ret: ret_ty }, tracer)
            }
            Some(ProcTarget::Native(id)) => {
                let result = self.call_native(id, args, proc.context, tracer)?;
                if let Some(shape) = ret {
                    self.stack.push(coerce(&shape, &result)?);
                }
                Ok(())
            }
        }
    }

    fn call_native<T: Tracer>(
        &mut self,
        id: NativeId,
        args: Vec<Value>,
        context: u64,
        tracer: &mut T,
    ) -> Result<Value, RuntimeError> {
        let f = self
            .natives
            .get(id.0 as usize)
            .map(Arc::clone)
            .ok_or_else(|| RuntimeError::UnknownNative(format!("#{}", id.0)))?;
        let name = self.unit.natives[id.0 as usize].as_str();
        tracer.trace_native(id);
        (*f)(NativeCall {
            name,
            args: &args,
            context,
            memory: &mut self.memory,
            layouts: &self.layouts,
        })
    }

    fn push_result(&mut self, value: Value) {
        if value != Value::Void {
            self.stack.push(value);
        }
    }

    /// Address and layout of local `slot` in the current frame.
    fn local(&self, slot: u16) -> Result<(u64, Slot), RuntimeError> {
        let frame = self
            .frames
            .current()
            .ok_or(RuntimeError::StackUnderflow(self.instr_ip))?;
        let layout = &self.frame_layouts[frame.routine.0 as usize];
        let Some(found) = layout.slots.get(slot as usize) else {
            return Err(RuntimeError::UnknownLocal {
                routine: self.routine(frame.routine)?.name.clone(),
                slot,
            });
        };
        let address = offset_address(frame.locals, found.offset as i64)?;
        Ok((address, found.clone()))
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        let base = self.frames.current().map_or(0, |f| f.stack_base);
        if self.stack.len() <= base {
            return Err(RuntimeError::StackUnderflow(self.instr_ip));
        }
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow(self.instr_ip))
    }

    /// Pop `n` values, returned in push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let base = self.frames.current().map_or(0, |f| f.stack_base);
        if self.stack.len() < base + n {
            return Err(RuntimeError::StackUnderflow(self.instr_ip));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_aggregate(&mut self, ty: u16) -> Result<ExternAggregate, RuntimeError> {
        match self.pop()? {
            Value::Aggregate(a) if a.ty() == TypeId(ty) => Ok(a),
            other => {
                let expected = self.layouts.types().display_name(TypeId(ty));
                Err(mismatch(expected, &other))
            }
        }
    }

    fn pop_pointer(&mut self) -> Result<ExternPointer, RuntimeError> {
        match self.pop()? {
            Value::Pointer(p) => Ok(p),
            other => Err(mismatch("pointer", &other)),
        }
    }

    fn pop_proc(&mut self) -> Result<ProcRef, RuntimeError> {
        match self.pop()? {
            Value::Proc(p) => Ok(p),
            other => Err(mismatch("proc", &other)),
        }
    }
}

/// Integer arithmetic wraps, as native code does.
fn arithmetic(op: Opcode, a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(match op {
            Opcode::Add => x.wrapping_add(y),
            Opcode::Sub => x.wrapping_sub(y),
            _ => x.wrapping_mul(y),
        }),
        (Value::UInt(x), Value::UInt(y)) => Value::UInt(match op {
            Opcode::Add => x.wrapping_add(y),
            Opcode::Sub => x.wrapping_sub(y),
            _ => x.wrapping_mul(y),
        }),
        (Value::Float(x), Value::Float(y)) => Value::Float(match op {
            Opcode::Add => x + y,
            Opcode::Sub => x - y,
            _ => x * y,
        }),
        (a, b) => return Err(mismatch(a.kind_name(), &b)),
    })
}

/// Whether a stack value can be the source of a cast from `kind`.
fn fits_kind(value: &Value, kind: ScalarKind) -> bool {
    match value {
        Value::Bool(_) => kind == ScalarKind::Bool,
        Value::Int(_) => kind.is_signed() && !kind.is_float(),
        Value::UInt(_) => !kind.is_signed() && kind != ScalarKind::Bool,
        Value::Float(_) => kind.is_float(),
        _ => false,
    }
}
