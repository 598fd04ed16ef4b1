use thiserror::Error;

use crate::operand::OperandMask;
use crate::parameter::{GpuConstantType, Semantic};
use crate::program::ProgramType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while building, processing or writing shader programs.
///
/// Resolution failures ([`Error::is_recoverable`]) mean a single producer could not add its
/// feature to the program; everything else is a configuration or content error that aborts
/// generation of the whole program set.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot resolve parameter {name}: requested type {requested:?} conflicts with existing type {existing:?}")]
    ParameterConflict {
        name: String,
        requested: GpuConstantType,
        existing: GpuConstantType,
    },

    #[error("parameter {name} is already declared in the {list} list")]
    DuplicateParameter { name: String, list: &'static str },

    #[error("semantic {semantic:?} index {index} is already declared in the {list} list")]
    DuplicateSemantic {
        semantic: Semantic,
        index: u32,
        list: &'static str,
    },

    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: u32,
        limit: u32,
    },

    #[error("cannot convert operand mask {mask:?} to a constant type")]
    InvalidOperandMask { mask: OperandMask },

    #[error("invalid {op} atom: {reason}")]
    InvalidAtom { op: String, reason: &'static str },

    #[error("parameter {name} used in {program:?} program is not declared by it")]
    UndeclaredParameter { name: String, program: ProgramType },

    #[error("{language} writer has no type mapping for {ty:?}")]
    MissingTypeMapping {
        language: &'static str,
        ty: GpuConstantType,
    },

    #[error("{language} writer has no binding for parameter {name} (semantic {semantic:?})")]
    MissingSemanticMapping {
        language: &'static str,
        name: String,
        semantic: Semantic,
    },

    #[error("{language} writer emits both {first} and {second} as `{name}`")]
    DuplicateInterfaceName {
        language: &'static str,
        name: String,
        first: String,
        second: String,
    },

    #[error("{language} writer does not support {program_type:?} programs")]
    UnsupportedProgramType {
        language: &'static str,
        program_type: ProgramType,
    },

    #[error("no program writer registered for language `{0}`")]
    UnknownLanguage(String),

    #[error("no sub render state registered for type `{0}`")]
    UnknownSubRenderState(String),

    #[error("vertex outputs use {floats} texcoord floats, exceeding the budget of {limit}")]
    InterpolatorFloatBudgetExceeded { floats: usize, limit: usize },

    #[error("compacted vertex outputs need {slots} texcoord slots, exceeding the budget of {limit}")]
    InterpolatorSlotBudgetExceeded { slots: usize, limit: usize },

    #[error("texcoord interpolator {name} has non-float type {ty:?}")]
    InvalidInterpolatorType { name: String, ty: GpuConstantType },

    #[error("fragment input {name} has no matching vertex output")]
    UnmatchedInterpolator { name: String },

    #[error("interpolator {name}: vertex output is {vertex:?} but fragment input is {fragment:?}")]
    InterpolatorTypeMismatch {
        name: String,
        vertex: GpuConstantType,
        fragment: GpuConstantType,
    },

    #[error("shader library `{0}` not found")]
    LibraryNotFound(String),

    #[error("failed to read shader library `{name}`: {source}")]
    LibraryIo {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shader library `{library}` line {line}: {message}")]
    LibraryParse {
        library: String,
        line: usize,
        message: String,
    },
}

impl Error {
    /// True for parameter resolution failures, which only invalidate the producer that
    /// requested the parameter.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ParameterConflict { .. }
                | Error::DuplicateParameter { .. }
                | Error::DuplicateSemantic { .. }
        )
    }
}
