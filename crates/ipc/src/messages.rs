//! Main IPC message enums for communication between the scene and the UI shell.

use serde::{Deserialize, Serialize};

use crate::commands::{DeformCommand, InteractionMode};
use crate::error::IpcError;

/// Lifecycle of the external solver engine, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineStatus {
    #[default]
    Unloaded,
    Loading,
    Ready,
    /// Load failed; deform mode stays disabled for the rest of the session
    Failed,
}

/// Handle and anchor indices, each sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSummary {
    pub handles: Vec<u32>,
    pub anchors: Vec<u32>,
}

/// Messages from the scene to the UI shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SceneToUi {
    /// Interaction mode changed (or a requested change was refused)
    ModeChanged { mode: InteractionMode },

    /// Handle/anchor membership changed
    ConstraintsChanged(ConstraintSummary),

    /// Solver engine lifecycle changed
    EngineStatusChanged { status: EngineStatus },

    /// A new mesh was loaded and the constraint set reset
    MeshLoaded {
        mesh_id: u64,
        vertex_count: u32,
        face_count: u32,
    },

    /// Error notification
    Error { code: String, message: String },
}

/// Messages from the UI shell to the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UiToScene {
    /// Deformation command
    DeformCommand(DeformCommand),
}

impl SceneToUi {
    /// Encode as JSON for the UI transport.
    pub fn to_json(&self) -> Result<String, IpcError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl UiToScene {
    /// Decode a JSON message from the UI transport.
    pub fn from_json(json: &str) -> Result<Self, IpcError> {
        if json.trim().is_empty() {
            return Err(IpcError::InvalidFormat("empty message".to_string()));
        }
        Ok(serde_json::from_str(json)?)
    }
}
