//! Wire contract between the deformation front-end and the solver engine.
//!
//! All buffers are flat: vertices and positions carry three `f32` per point,
//! faces carry three `u32` per triangle. Positions are in model-local space.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a solver-side mesh session.
pub type SessionId = u64;

/// Requests sent to the solver engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args")]
pub enum SolverRequest {
    /// Create a session for a mesh, replacing any previous one
    LoadMesh { vertices: Vec<f32>, faces: Vec<u32> },
    /// Upload the complete constraint set
    SetHandles {
        indices: Vec<u32>,
        positions: Vec<f32>,
    },
    /// Run at most `max_iterations` solver iterations
    Solve { max_iterations: u32 },
    /// Fetch the latest solved vertex buffer
    GetVertices,
    /// Release the current session
    Dispose,
}

impl SolverRequest {
    /// Short operation name for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::LoadMesh { .. } => "loadMesh",
            Self::SetHandles { .. } => "setHandles",
            Self::Solve { .. } => "solve",
            Self::GetVertices => "getVertices",
            Self::Dispose => "dispose",
        }
    }
}

/// Responses returned by the solver engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum SolverResponse {
    /// A mesh session was created
    SessionCreated { session: SessionId },
    /// The request was applied
    Ack,
    /// Latest solved vertices, `None` if no result is available
    Vertices(Option<Vec<f32>>),
}

/// Faults reported by the solver engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum SolverFault {
    #[error("engine failed to load: {0}")]
    LoadFailed(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("no active session")]
    NoSession,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unexpected response to {0}")]
    UnexpectedResponse(String),
}
