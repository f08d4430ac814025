//! Helpers for building small compiled units in tests.

use indexmap::IndexMap;

use quartz_bytecode::{
    Assembler, CompiledUnit, ConstantDecl, NativeId, Opcode, Operand, Routine, RoutineId,
    SourceNode,
};
use quartz_core::{TypeDef, TypeId, TypeTable};

pub fn struct_def(name: &str, fields: &[(&str, TypeId)]) -> TypeDef {
    TypeDef::Struct {
        name: name.to_string(),
        fields: to_map(fields),
    }
}

pub fn union_def(name: &str, fields: &[(&str, TypeId)]) -> TypeDef {
    TypeDef::Union {
        name: name.to_string(),
        fields: to_map(fields),
    }
}

fn to_map(fields: &[(&str, TypeId)]) -> IndexMap<String, TypeId> {
    fields
        .iter()
        .map(|(name, ty)| (name.to_string(), *ty))
        .collect()
}

/// Routine body emitter. Panics on malformed instructions.
pub struct Body<'a>(&'a mut Assembler);

impl Body<'_> {
    pub fn op(&mut self, opcode: Opcode, operands: &[Operand]) -> &mut Self {
        self.0.emit(opcode, operands).unwrap();
        self
    }

    pub fn op_at(&mut self, opcode: Opcode, operands: &[Operand], text: &str) -> &mut Self {
        self.0
            .emit_with_node(opcode, operands, SourceNode::new(text, 1, 1))
            .unwrap();
        self
    }

    pub fn asm(&mut self) -> &mut Assembler {
        self.0
    }
}

/// Accumulates routines, constants and natives into one unit.
pub struct UnitBuilder {
    asm: Assembler,
    unit: CompiledUnit,
    pool_size: u32,
}

impl UnitBuilder {
    pub fn new(types: TypeTable) -> Self {
        Self {
            asm: Assembler::new(),
            unit: CompiledUnit {
                types,
                ..CompiledUnit::default()
            },
            pool_size: 0,
        }
    }

    pub fn routine(
        &mut self,
        name: &str,
        params: u16,
        locals: &[TypeId],
        ret: Option<TypeId>,
        body: impl FnOnce(&mut Body<'_>),
    ) -> RoutineId {
        let id = RoutineId(self.unit.routines.len() as u16);
        self.unit.routines.push(Routine {
            name: name.to_string(),
            entry: self.asm.ip(),
            params,
            locals: locals.to_vec(),
            ret,
        });
        body(&mut Body(&mut self.asm));
        id
    }

    /// Declare a constant with the next pool offset; returns that offset.
    pub fn constant(&mut self, name: &str, ty: TypeId, size: usize, init: RoutineId) -> u32 {
        let offset = self.pool_size;
        self.pool_size += 1 + size as u32;
        self.unit.constants.push(ConstantDecl {
            name: name.to_string(),
            ty,
            initializer: init,
            offset,
        });
        offset
    }

    pub fn native(&mut self, name: &str) -> NativeId {
        self.unit.natives.push(name.to_string());
        NativeId(self.unit.natives.len() as u16 - 1)
    }

    pub fn finish(mut self) -> CompiledUnit {
        let (code, source_map) = self.asm.finish().unwrap();
        self.unit.code = code;
        self.unit.source_map = source_map;
        self.unit.validate().unwrap();
        self.unit
    }
}
