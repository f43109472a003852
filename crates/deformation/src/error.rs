//! Error taxonomy for the deformation pipeline.

use marionette_ipc::SolverFault;
use thiserror::Error;

use crate::types::VertexIndex;

/// Errors surfaced by the deformation pipeline.
///
/// Only [`DeformError::EngineLoadFailure`] is fatal; everything else aborts
/// the triggering operation and leaves state as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeformError {
    #[error("solver engine failed to load: {0}")]
    EngineLoadFailure(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("vertex buffer has {actual} floats, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("vertex index {index} out of range (vertex count {count})")]
    IndexOutOfRange { index: VertexIndex, count: usize },

    #[error("non-finite constraint position for vertex {index}")]
    InvalidNumeric { index: VertexIndex },

    #[error("solver produced no result")]
    NoSolverResult,

    #[error("solver engine is not initialized")]
    NotInitialized,

    #[error("no solver session (no mesh loaded)")]
    NoSession,

    #[error("solver engine fault: {0}")]
    Engine(#[from] SolverFault),
}

impl DeformError {
    /// Stable code reported to the UI shell.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EngineLoadFailure(_) => "engine_load_failure",
            Self::InvalidMesh(_) => "invalid_mesh",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::InvalidNumeric { .. } => "invalid_numeric",
            Self::NoSolverResult => "no_solver_result",
            Self::NotInitialized => "not_initialized",
            Self::NoSession => "no_session",
            Self::Engine(_) => "engine_fault",
        }
    }

    /// Fatal errors disable deform mode for the rest of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineLoadFailure(_))
    }
}

pub type DeformResult<T> = Result<T, DeformError>;
