//! Pointer interaction state machine.
//!
//! Turns raw pointer events into constraint edits (select mode) and drag
//! updates (deform mode). View mode is inert so the host camera controls can
//! consume the events instead.

use glam::{Vec2, Vec3};
use marionette_config::{DeformConfig, ModifierBindings};
use marionette_ipc::{InteractionMode, Modifiers};
use tracing::{debug, info};

use crate::constraints::{AnchorToggle, ConstraintSet};
use crate::mesh_store::MeshStore;
use crate::picking::{pick_marker, pick_vertex, CameraPose, DragPlane};
use crate::types::VertexIndex;

/// Phase of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

/// A pointer event in normalized device coordinates (`[-1, 1]`, +Y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub ndc: Vec2,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn down(ndc: Vec2, modifiers: Modifiers) -> Self {
        Self {
            kind: PointerKind::Down,
            ndc,
            modifiers,
        }
    }

    pub fn moved(ndc: Vec2) -> Self {
        Self {
            kind: PointerKind::Move,
            ndc,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn up(ndc: Vec2) -> Self {
        Self {
            kind: PointerKind::Up,
            ndc,
            modifiers: Modifiers::NONE,
        }
    }
}

/// An active handle drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub index: VertexIndex,
    pub plane: DragPlane,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DeformPhase {
    Idle,
    Dragging(DragSession),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    View,
    Select,
    Deform(DeformPhase),
}

/// What a pointer event or mode change did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionOutcome {
    /// Not consumed; the host may route it elsewhere (camera controls)
    PassThrough,
    /// Consumed, but the pick hit nothing
    Missed,
    HandleSelected {
        index: VertexIndex,
        position: Vec3,
    },
    AnchorToggled {
        index: VertexIndex,
        result: AnchorToggle,
    },
    DragStarted {
        index: VertexIndex,
    },
    /// New world-space target for the dragged handle
    DragMoved {
        index: VertexIndex,
        position: Vec3,
    },
    DragEnded {
        index: VertexIndex,
    },
}

/// View / Select / Deform state machine with an explicit drag sub-state.
#[derive(Debug, Clone)]
pub struct InteractionMachine {
    state: State,
    bindings: ModifierBindings,
    marker_radius: f32,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new(&DeformConfig::default())
    }
}

impl InteractionMachine {
    pub fn new(config: &DeformConfig) -> Self {
        Self {
            state: State::View,
            bindings: config.bindings,
            marker_radius: config.marker_pick_radius,
        }
    }

    pub fn mode(&self) -> InteractionMode {
        match self.state {
            State::View => InteractionMode::View,
            State::Select => InteractionMode::Select,
            State::Deform(_) => InteractionMode::Deform,
        }
    }

    /// The live drag session, if a handle is being dragged.
    pub fn drag(&self) -> Option<&DragSession> {
        match &self.state {
            State::Deform(DeformPhase::Dragging(session)) => Some(session),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag().is_some()
    }

    /// Switch modes. Switching away from deform while dragging closes the
    /// session and reports it as [`InteractionOutcome::DragEnded`].
    pub fn set_mode(&mut self, mode: InteractionMode) -> InteractionOutcome {
        if mode == self.mode() {
            return InteractionOutcome::PassThrough;
        }

        let closed = self.cancel_drag();
        self.state = match mode {
            InteractionMode::View => State::View,
            InteractionMode::Select => State::Select,
            InteractionMode::Deform => State::Deform(DeformPhase::Idle),
        };
        info!("Interaction mode: {:?}", mode);

        match closed {
            Some(index) => InteractionOutcome::DragEnded { index },
            None => InteractionOutcome::PassThrough,
        }
    }

    /// Close any drag session without leaving deform mode.
    pub fn cancel_drag(&mut self) -> Option<VertexIndex> {
        let index = self.drag()?.index;
        self.state = State::Deform(DeformPhase::Idle);
        debug!("Drag on vertex {} closed", index);
        Some(index)
    }

    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        camera: &CameraPose,
        mesh: &MeshStore,
        constraints: &mut ConstraintSet,
    ) -> InteractionOutcome {
        match self.state {
            State::View => InteractionOutcome::PassThrough,
            State::Select => self.handle_select(event, camera, mesh, constraints),
            State::Deform(DeformPhase::Idle) => self.handle_deform_idle(event, camera, constraints),
            State::Deform(DeformPhase::Dragging(session)) => {
                self.handle_dragging(session, event, camera)
            }
        }
    }

    fn handle_select(
        &self,
        event: &PointerEvent,
        camera: &CameraPose,
        mesh: &MeshStore,
        constraints: &mut ConstraintSet,
    ) -> InteractionOutcome {
        if event.kind != PointerKind::Down {
            return InteractionOutcome::PassThrough;
        }

        // Handle binding wins when both are held
        let as_handle = event.modifiers.is_held(self.bindings.handle);
        let as_anchor = event.modifiers.is_held(self.bindings.anchor);
        if !as_handle && !as_anchor {
            return InteractionOutcome::PassThrough;
        }

        let Some(index) = pick_vertex(event.ndc, camera, mesh) else {
            return InteractionOutcome::Missed;
        };
        let Ok(position) = mesh.vertex_world_position(index) else {
            return InteractionOutcome::Missed;
        };

        if as_handle {
            constraints.select_handle(index, position);
            debug!("Handle selected: vertex {}", index);
            InteractionOutcome::HandleSelected { index, position }
        } else {
            let result = constraints.toggle_anchor(index, position);
            debug!("Anchor toggle on vertex {}: {:?}", index, result);
            InteractionOutcome::AnchorToggled { index, result }
        }
    }

    fn handle_deform_idle(
        &mut self,
        event: &PointerEvent,
        camera: &CameraPose,
        constraints: &ConstraintSet,
    ) -> InteractionOutcome {
        if event.kind != PointerKind::Down {
            return InteractionOutcome::PassThrough;
        }

        let ray = camera.ray_from_ndc(event.ndc);
        let Some(index) = pick_marker(&ray, constraints.handles(), self.marker_radius) else {
            return InteractionOutcome::Missed;
        };
        let Some(constraint) = constraints.get(index) else {
            return InteractionOutcome::Missed;
        };

        let plane = DragPlane::facing_camera(constraint.position, camera);
        self.state = State::Deform(DeformPhase::Dragging(DragSession { index, plane }));
        debug!("Drag started on vertex {}", index);
        InteractionOutcome::DragStarted { index }
    }

    fn handle_dragging(
        &mut self,
        session: DragSession,
        event: &PointerEvent,
        camera: &CameraPose,
    ) -> InteractionOutcome {
        match event.kind {
            PointerKind::Move => {
                let ray = camera.ray_from_ndc(event.ndc);
                match session.plane.intersect(&ray) {
                    Some(position) => InteractionOutcome::DragMoved {
                        index: session.index,
                        position,
                    },
                    None => InteractionOutcome::Missed,
                }
            }
            PointerKind::Up => {
                self.state = State::Deform(DeformPhase::Idle);
                debug!("Drag ended on vertex {}", session.index);
                InteractionOutcome::DragEnded {
                    index: session.index,
                }
            }
            // A second press while dragging keeps the current session
            PointerKind::Down => InteractionOutcome::PassThrough,
        }
    }
}
