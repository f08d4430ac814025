//! C layout of resolved types.
//!
//! Every [`TypeId`] gets a [`Shape`]: how many bytes a value of that type
//! occupies in extern memory and how to read it back. Struct fields are
//! placed in declaration order at the next offset satisfying their
//! alignment, with the size rounded up to the struct's alignment. Union
//! fields all sit at offset 0. This matches the host C compiler, so the
//! bytes can be handed to native code as-is.

use std::sync::Arc;

use indexmap::IndexMap;

use quartz_core::{ScalarKind, TypeDef, TypeError, TypeId, TypeTable};

/// Size of a code address or data pointer.
pub(crate) const WORD: usize = size_of::<usize>();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateKind {
    Struct,
    Union,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayout {
    pub offset: usize,
    pub ty: TypeId,
    pub shape: Shape,
}

/// Resolved layout of a struct or union.
#[derive(Debug, PartialEq)]
pub struct AggregateLayout {
    pub id: TypeId,
    pub name: String,
    pub kind: AggregateKind,
    pub fields: IndexMap<String, FieldLayout>,
    pub size: usize,
    pub align: usize,
}

impl AggregateLayout {
    pub fn field(&self, index: u16) -> Result<(&str, &FieldLayout), TypeError> {
        self.fields
            .get_index(index as usize)
            .map(|(name, field)| (name.as_str(), field))
            .ok_or(TypeError::UnknownField {
                ty: self.id,
                field: index,
            })
    }
}

/// Memory representation of a type.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Scalar(ScalarKind),
    Pointer { pointee: TypeId },
    /// Code word, plus a context word for closures.
    Proc { closure: bool },
    Aggregate(Arc<AggregateLayout>),
}

impl Shape {
    pub fn size(&self) -> usize {
        match self {
            Self::Scalar(kind) => kind.size(),
            Self::Pointer { .. } => WORD,
            Self::Proc { closure } => WORD * (1 + *closure as usize),
            Self::Aggregate(layout) => layout.size,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            Self::Scalar(kind) => kind.align(),
            Self::Pointer { .. } | Self::Proc { .. } => align_of::<usize>(),
            Self::Aggregate(layout) => layout.align,
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.name().to_string(),
            Self::Pointer { pointee } => format!("{pointee}*"),
            Self::Proc { closure: false } => "proc".to_string(),
            Self::Proc { closure: true } => "closure proc".to_string(),
            Self::Aggregate(layout) => format!("`{}`", layout.name),
        }
    }
}

/// Place fields C-struct style. Returns (offsets, size, align).
pub fn struct_layout<'a>(
    shapes: impl IntoIterator<Item = &'a Shape>,
) -> (Vec<usize>, usize, usize) {
    let mut offsets = Vec::new();
    let mut offset = 0;
    let mut align = 1;
    for shape in shapes {
        offset = align_up(offset, shape.align());
        offsets.push(offset);
        offset += shape.size();
        align = align.max(shape.align());
    }
    (offsets, align_up(offset, align), align)
}

fn union_layout<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> (Vec<usize>, usize, usize) {
    let mut offsets = Vec::new();
    let mut size = 0;
    let mut align = 1;
    for shape in shapes {
        offsets.push(0);
        size = size.max(shape.size());
        align = align.max(shape.align());
    }
    (offsets, align_up(size, align), align)
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Shapes for every type of a table.
#[derive(Clone, Debug)]
pub struct TypeLayouts {
    types: TypeTable,
    shapes: Vec<Shape>,
}

impl TypeLayouts {
    /// Validate `types` and lay out every entry.
    pub fn compute(types: &TypeTable) -> Result<Self, TypeError> {
        types.validate()?;

        let mut memo = vec![None; types.len()];
        let shapes = types
            .iter()
            .map(|(id, _)| shape_of(types, id, &mut memo))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            types: types.clone(),
            shapes,
        })
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn shape(&self, ty: TypeId) -> Result<&Shape, TypeError> {
        self.shapes.get(ty.index()).ok_or(TypeError::UnknownType(ty))
    }

    pub fn size_of(&self, ty: TypeId) -> Result<usize, TypeError> {
        Ok(self.shape(ty)?.size())
    }

    pub fn aggregate(&self, ty: TypeId) -> Result<&Arc<AggregateLayout>, TypeError> {
        match self.shape(ty)? {
            Shape::Aggregate(layout) => Ok(layout),
            _ => Err(TypeError::NotAggregate(ty)),
        }
    }

    /// Parameter and return types of a proc type.
    pub fn signature(&self, ty: TypeId) -> Result<(&[TypeId], Option<TypeId>), TypeError> {
        match self.types.get(ty)? {
            TypeDef::Proc { params, ret, .. } => Ok((params, *ret)),
            _ => Err(TypeError::NotProc(ty)),
        }
    }
}

// Table validation guarantees no by-value cycles, so the recursion ends.
fn shape_of(
    types: &TypeTable,
    id: TypeId,
    memo: &mut [Option<Shape>],
) -> Result<Shape, TypeError> {
    if let Some(shape) = &memo[id.index()] {
        return Ok(shape.clone());
    }

    let shape = match types.get(id)? {
        TypeDef::Scalar(kind) => Shape::Scalar(*kind),
        TypeDef::Pointer { pointee } => Shape::Pointer { pointee: *pointee },
        TypeDef::Proc { closure, .. } => Shape::Proc { closure: *closure },
        TypeDef::Struct { name, fields } => {
            Shape::Aggregate(aggregate(types, id, name, fields, AggregateKind::Struct, memo)?)
        }
        TypeDef::Union { name, fields } => {
            Shape::Aggregate(aggregate(types, id, name, fields, AggregateKind::Union, memo)?)
        }
    };

    memo[id.index()] = Some(shape.clone());
    Ok(shape)
}

fn aggregate(
    types: &TypeTable,
    id: TypeId,
    name: &str,
    fields: &IndexMap<String, TypeId>,
    kind: AggregateKind,
    memo: &mut [Option<Shape>],
) -> Result<Arc<AggregateLayout>, TypeError> {
    let shapes = fields
        .values()
        .map(|ty| shape_of(types, *ty, memo))
        .collect::<Result<Vec<_>, _>>()?;

    let (offsets, size, align) = match kind {
        AggregateKind::Struct => struct_layout(&shapes),
        AggregateKind::Union => union_layout(&shapes),
    };

    let fields = fields
        .iter()
        .zip(shapes)
        .zip(offsets)
        .map(|(((name, ty), shape), offset)| {
            let field = FieldLayout {
                offset,
                ty: *ty,
                shape,
            };
            (name.clone(), field)
        })
        .collect();

    Ok(Arc::new(AggregateLayout {
        id,
        name: name.to_string(),
        kind,
        fields,
        size,
        align,
    }))
}
