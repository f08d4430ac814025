//! Human-readable disassembly.
//!
//! One line per instruction:
//!
//! ```text
//! 0000 PUSH_I64 257
//! 0009 CAST 114 (i64->u8)  ; x.to_u8 @ 3:5
//! ```
//!
//! The IP is zero-padded to [`IP_WIDTH`] digits, operands follow in table
//! order, a derived field (if the table defines one) is parenthesized, and
//! the source node (if any) trails after `;`. Tools parse this format, so
//! the padding and separators are fixed.

use std::fmt::Write as _;

use quartz_core::{Colors, TypeDef, TypeTable};

use super::codec::{CodecError, Decoder, Instruction};
use super::opcodes::DeriveCtx;
use super::source_map::{SourceMap, SourceNode};
use super::unit::CompiledUnit;

/// Zero-padding width of the IP column.
pub const IP_WIDTH: usize = 4;

/// Disassemble a whole stream without colors.
pub fn disassemble(code: &[u8], source_map: &SourceMap) -> Result<String, CodecError> {
    disassemble_colored(code, source_map, Colors::OFF)
}

/// Disassemble a whole stream.
///
/// Fails if the stream contains an unknown opcode or its last instruction
/// runs past the end of the buffer; no partial output is returned.
pub fn disassemble_colored(
    code: &[u8],
    source_map: &SourceMap,
    colors: Colors,
) -> Result<String, CodecError> {
    let mut out = String::new();
    for instr in Decoder::new(code) {
        let instr = instr?;
        out.push_str(&format_instruction(&instr, source_map.get(instr.ip), colors));
        out.push('\n');
    }
    Ok(out)
}

/// Format a single decoded instruction (no trailing newline).
///
/// Shared by the disassembler and the execution tracer.
pub fn format_instruction(
    instr: &Instruction,
    node: Option<&SourceNode>,
    colors: Colors,
) -> String {
    let c = colors;
    let def = instr.def();
    let mut line = String::new();

    write!(line, "{}{:0w$}{} ", c.dim, instr.ip, c.reset, w = IP_WIDTH).unwrap();
    write!(line, "{}{}{}", c.blue, def.name, c.reset).unwrap();
    for operand in instr.operands() {
        write!(line, " {}{operand}{}", c.green, c.reset).unwrap();
    }

    if let Some(derive) = def.derive {
        let ctx = DeriveCtx {
            ip: instr.ip,
            next_ip: instr.next_ip,
        };
        let derived = derive(&ctx, instr.operands());
        write!(line, " {}({derived}){}", c.green, c.reset).unwrap();
    }

    if let Some(node) = node {
        write!(line, "  {}; {node}{}", c.dim, c.reset).unwrap();
    }

    line
}

/// Dump a whole unit: type table, routines, constants, natives, then the
/// code with a label line at every routine entry.
pub fn dump_unit(unit: &CompiledUnit, colors: Colors) -> Result<String, CodecError> {
    let mut out = String::new();
    dump_types(&mut out, &unit.types, colors);
    dump_routines(&mut out, unit, colors);
    dump_constants(&mut out, unit, colors);
    dump_natives(&mut out, unit, colors);
    dump_code(&mut out, unit, colors)?;
    Ok(out)
}

fn dump_types(out: &mut String, types: &TypeTable, c: Colors) {
    writeln!(out, "{}[types]{}", c.blue, c.reset).unwrap();
    for (id, def) in types.iter() {
        let shown = match def {
            TypeDef::Struct { name, fields } | TypeDef::Union { name, fields } => {
                let keyword = if matches!(def, TypeDef::Struct { .. }) {
                    "struct"
                } else {
                    "union"
                };
                let fields: Vec<_> = fields
                    .iter()
                    .map(|(field, ty)| format!("{field}: {}", types.display_name(*ty)))
                    .collect();
                format!("{keyword} {name} {{ {} }}", fields.join(", "))
            }
            TypeDef::Proc { closure: true, .. } => {
                format!("{} closure", types.display_name(id))
            }
            _ => types.display_name(id),
        };
        writeln!(out, "{id} = {}{shown}{}", c.green, c.reset).unwrap();
    }
    out.push('\n');
}

fn dump_routines(out: &mut String, unit: &CompiledUnit, c: Colors) {
    writeln!(out, "{}[routines]{}", c.blue, c.reset).unwrap();
    let width = unit.routines.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for routine in &unit.routines {
        let params: Vec<_> = routine
            .locals
            .iter()
            .take(routine.params as usize)
            .map(|ty| unit.types.display_name(*ty))
            .collect();
        let ret = routine
            .ret
            .map_or_else(|| "void".to_string(), |ty| unit.types.display_name(ty));
        writeln!(
            out,
            "{}{:width$}{} = {:0w$} :: ({}) -> {ret}  {}locals={}{}",
            c.blue,
            routine.name,
            c.reset,
            routine.entry,
            params.join(", "),
            c.dim,
            routine.locals.len(),
            c.reset,
            w = IP_WIDTH,
        )
        .unwrap();
    }
    out.push('\n');
}

fn dump_constants(out: &mut String, unit: &CompiledUnit, c: Colors) {
    if unit.constants.is_empty() {
        return;
    }
    writeln!(out, "{}[constants]{}", c.blue, c.reset).unwrap();
    for constant in &unit.constants {
        let init = unit
            .routines
            .get(constant.initializer.0 as usize)
            .map_or("?", |r| r.name.as_str());
        writeln!(
            out,
            "{} @{} :: {} <- {}{init}{}",
            constant.name,
            constant.offset,
            unit.types.display_name(constant.ty),
            c.blue,
            c.reset,
        )
        .unwrap();
    }
    out.push('\n');
}

fn dump_natives(out: &mut String, unit: &CompiledUnit, c: Colors) {
    if unit.natives.is_empty() {
        return;
    }
    writeln!(out, "{}[natives]{}", c.blue, c.reset).unwrap();
    for (i, name) in unit.natives.iter().enumerate() {
        writeln!(out, "#{i} {}{name}{}", c.green, c.reset).unwrap();
    }
    out.push('\n');
}

fn dump_code(out: &mut String, unit: &CompiledUnit, c: Colors) -> Result<(), CodecError> {
    writeln!(out, "{}[code]{}", c.blue, c.reset).unwrap();
    let mut first_label = true;
    for instr in Decoder::new(&unit.code) {
        let instr = instr?;
        if let Some(label) = unit.label_at(instr.ip) {
            let sep = if first_label { "" } else { "\n" };
            writeln!(out, "{sep}{}{label}{}:", c.blue, c.reset).unwrap();
            first_label = false;
        }
        out.push_str(&format_instruction(&instr, unit.source_map.get(instr.ip), c));
        out.push('\n');
    }
    Ok(())
}
