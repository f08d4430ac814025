//! Resolved foreign types.
//!
//! The front-end resolves every type an instruction can mention before the
//! core sees it. What arrives here is a flat table indexed by [`TypeId`]:
//! scalars, C structs and unions, pointers and procs. Layout (offsets,
//! sizes) is computed from this table by the VM; the table itself carries
//! only shape.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Index into a [`TypeTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TypeId(pub u16);

impl TypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Primitive C scalar types.
///
/// The discriminant is the stable 4-bit code used in packed operands
/// (see `CAST`), so variants must never be reordered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum ScalarKind {
    Bool = 0,
    I8 = 1,
    U8 = 2,
    I16 = 3,
    U16 = 4,
    I32 = 5,
    U32 = 6,
    I64 = 7,
    U64 = 8,
    F32 = 9,
    F64 = 10,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 11] = [
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Size in bytes on the host platform.
    pub fn size(self) -> usize {
        match self {
            Self::Bool => size_of::<bool>(),
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 => 4,
            Self::I64 | Self::U64 => 8,
            Self::F32 => size_of::<f32>(),
            Self::F64 => size_of::<f64>(),
        }
    }

    /// Alignment in bytes on the host platform.
    ///
    /// Rust primitives share the C ABI's alignment, so asking the compiler
    /// keeps 32-bit targets (where `i64` may be 4-aligned) correct.
    pub fn align(self) -> usize {
        match self {
            Self::Bool => align_of::<bool>(),
            Self::I8 => align_of::<i8>(),
            Self::U8 => align_of::<u8>(),
            Self::I16 => align_of::<i16>(),
            Self::U16 => align_of::<u16>(),
            Self::I32 => align_of::<i32>(),
            Self::U32 => align_of::<u32>(),
            Self::I64 => align_of::<i64>(),
            Self::U64 => align_of::<u64>(),
            Self::F32 => align_of::<f32>(),
            Self::F64 => align_of::<f64>(),
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::F32 | Self::F64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// A resolved type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDef {
    Scalar(ScalarKind),
    /// C struct: fields in declaration order.
    Struct {
        name: String,
        fields: IndexMap<String, TypeId>,
    },
    /// C union: every field starts at offset 0.
    Union {
        name: String,
        fields: IndexMap<String, TypeId>,
    },
    Pointer { pointee: TypeId },
    /// Callable reference. A non-closure proc is a bare code address (a C
    /// function pointer); a closure proc also carries a context word.
    Proc {
        params: Vec<TypeId>,
        ret: Option<TypeId>,
        closure: bool,
    },
}

impl TypeDef {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Struct { .. } | Self::Union { .. })
    }

    /// Fields of a struct or union, in declaration order.
    pub fn fields(&self) -> Option<&IndexMap<String, TypeId>> {
        match self {
            Self::Struct { fields, .. } | Self::Union { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

/// Type table errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("unknown type id {0}")]
    UnknownType(TypeId),
    #[error("aggregate `{0}` has no fields")]
    EmptyAggregate(String),
    #[error("aggregate `{0}` contains itself by value")]
    RecursiveAggregate(String),
    #[error("type {0} is not an aggregate")]
    NotAggregate(TypeId),
    #[error("type {0} is not a proc")]
    NotProc(TypeId),
    #[error("aggregate {ty} has no field #{field}")]
    UnknownField { ty: TypeId, field: u16 },
}

/// Flat table of resolved types, indexed by [`TypeId`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    defs: Vec<TypeDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a type definition and return its id.
    pub fn add(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.defs.len() as u16);
        self.defs.push(def);
        id
    }

    /// Id of the scalar type, adding it on first use.
    pub fn scalar(&mut self, kind: ScalarKind) -> TypeId {
        self.find_or_add(TypeDef::Scalar(kind))
    }

    /// Id of the pointer-to-`pointee` type, adding it on first use.
    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        self.find_or_add(TypeDef::Pointer { pointee })
    }

    fn find_or_add(&mut self, def: TypeDef) -> TypeId {
        match self.defs.iter().position(|d| *d == def) {
            Some(i) => TypeId(i as u16),
            None => self.add(def),
        }
    }

    pub fn get(&self, id: TypeId) -> Result<&TypeDef, TypeError> {
        self.defs.get(id.index()).ok_or(TypeError::UnknownType(id))
    }

    /// Look up a struct or union by name.
    pub fn by_name(&self, name: &str) -> Option<TypeId> {
        self.defs
            .iter()
            .position(|d| match d {
                TypeDef::Struct { name: n, .. } | TypeDef::Union { name: n, .. } => n == name,
                _ => false,
            })
            .map(|i| TypeId(i as u16))
    }

    /// Resolve a field index of an aggregate to its name and type.
    pub fn field(&self, ty: TypeId, field: u16) -> Result<(&str, TypeId), TypeError> {
        let fields = self.get(ty)?.fields().ok_or(TypeError::NotAggregate(ty))?;
        fields
            .get_index(field as usize)
            .map(|(name, ty)| (name.as_str(), *ty))
            .ok_or(TypeError::UnknownField { ty, field })
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDef)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, d)| (TypeId(i as u16), d))
    }

    /// Human-readable type name (`i32`, `Point`, `Point*`, `Proc(i32 -> i32)`).
    pub fn display_name(&self, id: TypeId) -> String {
        let Ok(def) = self.get(id) else {
            return id.to_string();
        };
        match def {
            TypeDef::Scalar(kind) => kind.name().to_string(),
            TypeDef::Struct { name, .. } | TypeDef::Union { name, .. } => name.clone(),
            TypeDef::Pointer { pointee } => format!("{}*", self.display_name(*pointee)),
            TypeDef::Proc { params, ret, .. } => {
                let params: Vec<_> = params.iter().map(|p| self.display_name(*p)).collect();
                let ret = ret.map_or_else(|| "void".to_string(), |r| self.display_name(r));
                format!("Proc({} -> {ret})", params.join(", "))
            }
        }
    }

    /// Check that every referenced id exists, aggregates are non-empty, and
    /// no aggregate contains itself by value (through pointers is fine).
    pub fn validate(&self) -> Result<(), TypeError> {
        for (_, def) in self.iter() {
            match def {
                TypeDef::Scalar(_) => {}
                TypeDef::Struct { name, fields } | TypeDef::Union { name, fields } => {
                    if fields.is_empty() {
                        return Err(TypeError::EmptyAggregate(name.clone()));
                    }
                    for ty in fields.values() {
                        self.get(*ty)?;
                    }
                }
                TypeDef::Pointer { pointee } => {
                    self.get(*pointee)?;
                }
                TypeDef::Proc { params, ret, .. } => {
                    for ty in params.iter().chain(ret.iter()) {
                        self.get(*ty)?;
                    }
                }
            }
        }

        // 0 = unvisited, 1 = on the current path, 2 = done
        let mut state = vec![0u8; self.defs.len()];
        for (id, _) in self.iter() {
            self.check_by_value_cycle(id, &mut state)?;
        }
        Ok(())
    }

    fn check_by_value_cycle(&self, id: TypeId, state: &mut [u8]) -> Result<(), TypeError> {
        match state[id.index()] {
            2 => return Ok(()),
            1 => {
                let name = match &self.defs[id.index()] {
                    TypeDef::Struct { name, .. } | TypeDef::Union { name, .. } => name.clone(),
                    _ => id.to_string(),
                };
                return Err(TypeError::RecursiveAggregate(name));
            }
            _ => {}
        }
        state[id.index()] = 1;
        if let Some(fields) = self.defs[id.index()].fields() {
            for ty in fields.values() {
                self.check_by_value_cycle(*ty, state)?;
            }
        }
        state[id.index()] = 2;
        Ok(())
    }
}
