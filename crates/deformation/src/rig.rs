//! The assembled deformation pipeline.
//!
//! [`DeformationRig`] owns one of each component and routes pointer input,
//! frame callbacks and UI commands between them. Everything the UI shell
//! needs to know is queued as [`SceneToUi`] messages.

use glam::{Quat, Vec3};
use marionette_config::DeformConfig;
use marionette_ipc::{
    DeformCommand, EngineStatus, InteractionMode, SceneToUi, SolverFault, UiToScene,
};
use tracing::{info, warn};

use crate::constraints::{AnchorToggle, ConstraintSet};
use crate::error::{DeformError, DeformResult};
use crate::interaction::{InteractionMachine, InteractionOutcome, PointerEvent};
use crate::mesh_store::{MeshHandle, MeshStore};
use crate::picking::CameraPose;
use crate::scheduler::{DeformationScheduler, FrameOutcome};
use crate::session::{EngineLoader, InitOutcome, InitTicket, SolverEngine, SolverSession};
use crate::types::{ModelTransform, VertexIndex};

/// Mesh, constraints, interaction, scheduling and solver in one place.
#[derive(Debug)]
pub struct DeformationRig {
    mesh: MeshStore,
    constraints: ConstraintSet,
    machine: InteractionMachine,
    scheduler: DeformationScheduler,
    session: SolverSession,
    fatal: Option<DeformError>,
    outbound: Vec<SceneToUi>,
}

impl Default for DeformationRig {
    fn default() -> Self {
        Self::new(&DeformConfig::default())
    }
}

impl DeformationRig {
    pub fn new(config: &DeformConfig) -> Self {
        Self {
            mesh: MeshStore::new(),
            constraints: ConstraintSet::new(),
            machine: InteractionMachine::new(config),
            scheduler: DeformationScheduler::new(config.solver_iterations),
            session: SolverSession::new(),
            fatal: None,
            outbound: Vec::new(),
        }
    }

    pub fn mesh(&self) -> &MeshStore {
        &self.mesh
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn mode(&self) -> InteractionMode {
        self.machine.mode()
    }

    pub fn is_dragging(&self) -> bool {
        self.machine.is_dragging()
    }

    /// Vertex under an active drag.
    pub fn dragged_handle(&self) -> Option<VertexIndex> {
        self.machine.drag().map(|session| session.index)
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.session.status()
    }

    /// The error that disabled deform mode, if any.
    pub fn fatal_error(&self) -> Option<&DeformError> {
        self.fatal.as_ref()
    }

    /// Load the solver engine and upload the current mesh, if any.
    pub async fn init_engine<L: EngineLoader>(&mut self, loader: &L) -> DeformResult<InitOutcome> {
        let Some(ticket) = self.begin_engine_load()? else {
            return Ok(if self.session.is_ready() {
                InitOutcome::Ready
            } else {
                InitOutcome::Pending
            });
        };
        let result = loader.load().await;
        self.complete_engine_load(ticket, result)
    }

    /// Start a host-driven engine load. See [`SolverSession::begin_init`].
    pub fn begin_engine_load(&mut self) -> DeformResult<Option<InitTicket>> {
        let ticket = self.session.begin_init()?;
        if ticket.is_some() {
            self.push_status();
        }
        Ok(ticket)
    }

    /// Finish a host-driven engine load.
    pub fn complete_engine_load<E: SolverEngine + 'static>(
        &mut self,
        ticket: InitTicket,
        result: Result<E, SolverFault>,
    ) -> DeformResult<InitOutcome> {
        match self.session.complete_init(ticket, result) {
            Ok(InitOutcome::Ready) => {
                self.push_status();
                if self.mesh.is_loaded() {
                    if let Err(err) = self.upload_mesh() {
                        self.push_error(&err);
                        return Err(err);
                    }
                }
                Ok(InitOutcome::Ready)
            }
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                if err.is_fatal() {
                    self.fatal = Some(err.clone());
                    if self.machine.mode() == InteractionMode::Deform {
                        self.set_mode_unchecked(InteractionMode::View);
                    }
                }
                self.push_status();
                self.push_error(&err);
                Err(err)
            }
        }
    }

    /// Replace the mesh. Clears every constraint and any drag in progress.
    ///
    /// If the engine rejects the new mesh, the previous one is restored and
    /// re-uploaded, and constraints are kept.
    pub fn load_mesh(&mut self, vertices: Vec<f32>, faces: &[u32]) -> DeformResult<MeshHandle> {
        let previous = self.mesh.clone();
        let handle = match self.mesh.load(vertices, faces) {
            Ok(handle) => handle,
            Err(err) => {
                self.push_error(&err);
                return Err(err);
            }
        };

        if self.session.is_ready() {
            if let Err(err) = self.upload_mesh() {
                warn!("Engine rejected mesh {}: {}", handle.mesh_id, err);
                self.mesh = previous;
                self.restore_session();
                self.push_error(&err);
                return Err(err);
            }
        }

        self.machine.cancel_drag();
        self.scheduler.cancel();
        self.constraints.clear();

        self.outbound.push(SceneToUi::MeshLoaded {
            mesh_id: handle.mesh_id,
            vertex_count: handle.vertex_count as u32,
            face_count: handle.face_count as u32,
        });
        self.push_constraints();
        Ok(handle)
    }

    fn upload_mesh(&mut self) -> DeformResult<()> {
        let faces: &[u32] = bytemuck::cast_slice(self.mesh.faces());
        self.session.load_mesh(self.mesh.local_vertices(), faces)?;
        Ok(())
    }

    /// Re-upload the current mesh after a failed replacement released the
    /// old solver session.
    fn restore_session(&mut self) {
        if !self.mesh.is_loaded() {
            return;
        }
        if let Err(err) = self.upload_mesh() {
            warn!("Failed to restore solver session: {}", err);
            self.push_error(&err);
        }
    }

    /// Switch interaction mode. Deform is refused after a fatal engine error.
    pub fn set_mode(&mut self, mode: InteractionMode) -> DeformResult<InteractionOutcome> {
        if mode == InteractionMode::Deform {
            if let Some(err) = self.fatal.clone() {
                warn!("Deform mode unavailable: {}", err);
                self.push_error(&err);
                // Re-announce the mode that stays active
                self.outbound.push(SceneToUi::ModeChanged {
                    mode: self.machine.mode(),
                });
                return Err(err);
            }
        }
        Ok(self.set_mode_unchecked(mode))
    }

    fn set_mode_unchecked(&mut self, mode: InteractionMode) -> InteractionOutcome {
        if mode == self.machine.mode() {
            return InteractionOutcome::PassThrough;
        }
        let outcome = self.machine.set_mode(mode);
        if matches!(outcome, InteractionOutcome::DragEnded { .. }) {
            self.scheduler.cancel();
        }
        self.outbound.push(SceneToUi::ModeChanged { mode });
        outcome
    }

    /// Feed one pointer event through the state machine.
    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        camera: &CameraPose,
    ) -> InteractionOutcome {
        let outcome = self
            .machine
            .handle_pointer(event, camera, &self.mesh, &mut self.constraints);

        match outcome {
            InteractionOutcome::HandleSelected { .. } => self.push_constraints(),
            InteractionOutcome::AnchorToggled { result, .. }
                if result != AnchorToggle::RejectedHandle =>
            {
                self.push_constraints()
            }
            InteractionOutcome::DragMoved { index, position } => {
                self.scheduler.on_handle_move(index, position);
            }
            _ => {}
        }
        outcome
    }

    /// Frame callback: run the coalesced solve, if one is pending.
    ///
    /// Errors are also queued for the UI; none of them leaves the rig in an
    /// inconsistent state.
    pub fn run_frame(&mut self) -> DeformResult<FrameOutcome> {
        let result = self.scheduler.run_deformation(
            &mut self.mesh,
            &mut self.constraints,
            &mut self.session,
        );
        if let Err(err) = &result {
            warn!("Deformation frame failed: {}", err);
            self.push_error(err);
        }
        result
    }

    /// Whether a solve is waiting for the next frame.
    pub fn has_pending_frame(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    /// Drop every handle and anchor and end any drag.
    pub fn clear_selection(&mut self) {
        self.machine.cancel_drag();
        self.scheduler.cancel();
        self.constraints.clear();
        self.push_constraints();
    }

    /// Replace the model transform and re-derive constraint targets from the
    /// moved vertices.
    pub fn set_model_transform(&mut self, transform: ModelTransform) {
        if !transform.is_invertible() {
            warn!("Ignoring non-invertible model transform: {:?}", transform);
            return;
        }
        self.mesh.set_transform(transform);

        let indices: Vec<u32> = self.constraints.snapshot().keys().copied().collect();
        for index in indices {
            if let Ok(position) = self.mesh.vertex_world_position(index) {
                self.constraints.update_position(index, position);
            }
        }
    }

    /// Apply a command from the UI shell.
    pub fn handle_ui_message(&mut self, message: UiToScene) {
        let UiToScene::DeformCommand(command) = message;
        match command {
            DeformCommand::SetMode(mode) => {
                // Refusal is already reported through the outbound queue
                let _ = self.set_mode(mode);
            }
            DeformCommand::ClearSelection => self.clear_selection(),
            DeformCommand::SetModelTransform {
                translation,
                rotation,
                scale,
            } => {
                let transform = ModelTransform::new(
                    Vec3::from_array(translation),
                    Quat::from_array(rotation).normalize(),
                    scale,
                );
                self.set_model_transform(transform);
            }
        }
    }

    /// Take every queued UI message.
    pub fn drain_messages(&mut self) -> Vec<SceneToUi> {
        std::mem::take(&mut self.outbound)
    }

    /// Release the solver session. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.scheduler.cancel();
        self.session.dispose();
        info!("Deformation rig disposed");
    }

    fn push_constraints(&mut self) {
        self.outbound
            .push(SceneToUi::ConstraintsChanged(self.constraints.summary()));
    }

    fn push_status(&mut self) {
        self.outbound.push(SceneToUi::EngineStatusChanged {
            status: self.session.status(),
        });
    }

    fn push_error(&mut self, err: &DeformError) {
        self.outbound.push(SceneToUi::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }
}
