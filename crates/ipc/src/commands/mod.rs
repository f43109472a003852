//! Command types for IPC messages.

use serde::{Deserialize, Serialize};

/// Interaction mode selected by the UI shell.
///
/// The scene reacts to mode changes but never switches modes on its own,
/// except to refuse `Deform` when the solver engine failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Pointer input drives the camera only
    #[default]
    View,
    /// Modifier-clicks pick handle and anchor vertices
    Select,
    /// Dragging a handle marker deforms the mesh
    Deform,
}

/// Deformation commands issued by the UI shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeformCommand {
    /// Switch the interaction mode
    SetMode(InteractionMode),
    /// Drop every handle and anchor
    ClearSelection,
    /// Replace the model transform (uniform scale)
    SetModelTransform {
        translation: [f32; 3],
        /// Quaternion (x, y, z, w)
        rotation: [f32; 4],
        scale: f32,
    },
}
