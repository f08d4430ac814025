//! Call frames.
//!
//! A frame's locals live in a memory block laid out like a C struct of the
//! routine's local types, so `pointerof(local)` is an ordinary extern
//! pointer. The block is released when the frame returns; pointers that
//! outlive it fail on access.

use quartz_bytecode::{Routine, RoutineId};
use quartz_core::{TypeError, TypeId};

use super::layout::{Shape, TypeLayouts, struct_layout};

/// Placement of one local slot inside the frame block.
#[derive(Clone, Debug)]
pub struct Slot {
    pub offset: usize,
    pub ty: TypeId,
    pub shape: Shape,
}

/// Frame block layout of a routine, computed once per VM.
#[derive(Clone, Debug)]
pub struct FrameLayout {
    pub slots: Vec<Slot>,
    pub size: usize,
}

impl FrameLayout {
    pub fn compute(routine: &Routine, layouts: &TypeLayouts) -> Result<Self, TypeError> {
        let shapes = routine
            .locals
            .iter()
            .map(|ty| layouts.shape(*ty).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let (offsets, size, _) = struct_layout(&shapes);

        let slots = routine
            .locals
            .iter()
            .zip(shapes)
            .zip(offsets)
            .map(|((ty, shape), offset)| Slot {
                offset,
                ty: *ty,
                shape,
            })
            .collect();
        Ok(Self { slots, size })
    }
}

/// Why a frame was pushed, which decides what `RETURN` does with the result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Entered from the host; returning ends execution.
    Host,
    /// `CALL`; the result goes on the caller's stack.
    Call,
    /// `CALL_PROC` into a routine; the result is converted to the proc
    /// type's return type, or dropped if the proc returns nothing.
    ProcCall { ret: Option<TypeId> },
    /// Constant initializer; the result is stored in the pool first.
    ConstInit { offset: u32 },
}

#[derive(Clone, Copy, Debug)]
pub struct Frame {
    pub routine: RoutineId,
    pub kind: FrameKind,
    /// Where to continue on `RETURN`.
    pub return_ip: u32,
    /// Address of the locals block.
    pub locals: u64,
    /// Value stack height at entry; the frame may not pop below it.
    pub stack_base: usize,
}

#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    #[inline]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Remove all frames, innermost first.
    pub fn drain(&mut self) -> impl Iterator<Item = Frame> + '_ {
        self.frames.drain(..).rev()
    }
}
