//! Compiled unit: everything the VM needs to run a program.
//!
//! The binary container is a [`Header`] followed by a postcard payload.
//! JSON is accepted as a hand-editable alternative.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use quartz_core::{TypeError, TypeId, TypeTable};

use super::codec::{CodecError, Decoder};
use super::header::{HEADER_SIZE, Header, MAGIC, VERSION};
use super::source_map::SourceMap;

/// Index into [`CompiledUnit::routines`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutineId(pub u16);

/// Index into [`CompiledUnit::natives`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeId(pub u16);

/// A callable unit of code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    /// IP of the first instruction.
    pub entry: u32,
    /// Number of leading `locals` filled from call arguments.
    pub params: u16,
    /// Types of all local slots, parameters first.
    pub locals: Vec<TypeId>,
    pub ret: Option<TypeId>,
}

/// A global constant as declared by the compiler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDecl {
    pub name: String,
    pub ty: TypeId,
    /// Zero-argument routine computing the value.
    pub initializer: RoutineId,
    /// Pool offset of the init flag; the value follows it.
    pub offset: u32,
}

/// Unit load and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("invalid magic: expected QZBC")]
    InvalidMagic,
    #[error("unsupported version: {0} (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("file too small: {0} bytes (minimum {HEADER_SIZE})")]
    FileTooSmall(usize),
    #[error("size mismatch: header says {header} payload bytes, got {actual}")]
    SizeMismatch { header: u32, actual: usize },
    #[error("checksum mismatch: header says {header:08x}, payload hashes to {actual:08x}")]
    ChecksumMismatch { header: u32, actual: u32 },
    #[error("malformed payload: {0}")]
    Payload(#[from] postcard::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("type table: {0}")]
    Types(#[from] TypeError),
    #[error("code: {0}")]
    Code(#[from] CodecError),
    #[error("routine `{name}` entry {entry:04} is not an instruction boundary")]
    MisalignedEntry { name: String, entry: u32 },
    #[error("routine `{0}` declares more params than locals")]
    ParamsExceedLocals(String),
    #[error("unknown routine #{0}")]
    UnknownRoutine(u16),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledUnit {
    pub code: Vec<u8>,
    pub source_map: SourceMap,
    pub types: TypeTable,
    pub routines: Vec<Routine>,
    pub constants: Vec<ConstantDecl>,
    /// Foreign symbol names, resolved against a registry when the VM is built.
    pub natives: Vec<String>,
    /// Default routine for `exec`.
    pub entry: Option<RoutineId>,
}

impl CompiledUnit {
    pub fn routine(&self, id: RoutineId) -> Result<&Routine, UnitError> {
        self.routines
            .get(id.0 as usize)
            .ok_or(UnitError::UnknownRoutine(id.0))
    }

    pub fn routine_by_name(&self, name: &str) -> Option<RoutineId> {
        self.routines
            .iter()
            .position(|r| r.name == name)
            .map(|i| RoutineId(i as u16))
    }

    /// Name of the routine whose code starts at `ip`.
    pub fn label_at(&self, ip: u32) -> Option<&str> {
        self.routines
            .iter()
            .find(|r| r.entry == ip)
            .map(|r| r.name.as_str())
    }

    /// Serialize to the binary container.
    pub fn to_bytes(&self) -> Result<Vec<u8>, UnitError> {
        let payload = postcard::to_allocvec(self)?;
        let header = Header::for_payload(&payload);
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Load from the binary container, checking header and checksum.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UnitError> {
        if bytes.len() < HEADER_SIZE {
            return Err(UnitError::FileTooSmall(bytes.len()));
        }

        let header = Header::from_bytes(&bytes[..HEADER_SIZE]);
        if !header.validate_magic() {
            return Err(UnitError::InvalidMagic);
        }
        if !header.validate_version() {
            return Err(UnitError::UnsupportedVersion(header.version));
        }

        let payload = &bytes[HEADER_SIZE..];
        if header.payload_size as usize != payload.len() {
            return Err(UnitError::SizeMismatch {
                header: header.payload_size,
                actual: payload.len(),
            });
        }
        let actual = crc32fast::hash(payload);
        if actual != header.checksum {
            return Err(UnitError::ChecksumMismatch {
                header: header.checksum,
                actual,
            });
        }

        Ok(postcard::from_bytes(payload)?)
    }

    pub fn to_json(&self) -> Result<String, UnitError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, UnitError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a unit file, binary or JSON (sniffed by magic), and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UnitError> {
        let bytes = std::fs::read(path)?;
        let unit = if bytes.starts_with(&MAGIC) {
            Self::from_bytes(&bytes)?
        } else {
            serde_json::from_slice(&bytes)?
        };
        unit.validate()?;
        Ok(unit)
    }

    /// Structural checks the VM relies on: a well-formed type table, a code
    /// stream that decodes to its exact end, and routine entries that land
    /// on instruction boundaries.
    pub fn validate(&self) -> Result<(), UnitError> {
        self.types.validate()?;

        let mut boundaries = Vec::new();
        for instr in Decoder::new(&self.code) {
            boundaries.push(instr?.ip);
        }

        for routine in &self.routines {
            if boundaries.binary_search(&routine.entry).is_err() {
                return Err(UnitError::MisalignedEntry {
                    name: routine.name.clone(),
                    entry: routine.entry,
                });
            }
            if routine.params as usize > routine.locals.len() {
                return Err(UnitError::ParamsExceedLocals(routine.name.clone()));
            }
            for ty in routine.locals.iter().chain(routine.ret.iter()) {
                self.types.get(*ty)?;
            }
        }

        for constant in &self.constants {
            self.types.get(constant.ty)?;
            self.routine(constant.initializer)?;
        }
        if let Some(entry) = self.entry {
            self.routine(entry)?;
        }
        Ok(())
    }
}
