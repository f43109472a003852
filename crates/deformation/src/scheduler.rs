//! Frame-coalesced deformation scheduling.
//!
//! Pointer moves arrive far faster than the solver can run. Every move
//! overwrites a single pending request, and the host's frame callback runs at
//! most one solve with whatever is latest.

use glam::Vec3;
use tracing::{debug, warn};

use crate::constraints::ConstraintSet;
use crate::error::{DeformError, DeformResult};
use crate::mesh_store::MeshStore;
use crate::session::SolverSession;
use crate::types::VertexIndex;

/// Latest-value-wins slot with a single "frame scheduled" flag.
#[derive(Debug, Clone)]
pub struct CoalescedTask<T> {
    pending: Option<T>,
    scheduled: bool,
}

impl<T> Default for CoalescedTask<T> {
    fn default() -> Self {
        Self {
            pending: None,
            scheduled: false,
        }
    }
}

impl<T> CoalescedTask<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the pending value. Returns `true` if this call scheduled a
    /// new frame, `false` if one was already scheduled.
    pub fn submit(&mut self, value: T) -> bool {
        self.pending = Some(value);
        let newly_scheduled = !self.scheduled;
        self.scheduled = true;
        newly_scheduled
    }

    /// Take the pending value and clear the scheduled flag.
    pub fn begin(&mut self) -> Option<T> {
        self.scheduled = false;
        self.pending.take()
    }

    /// Drop pending work without running it.
    pub fn cancel(&mut self) {
        self.scheduled = false;
        self.pending = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }
}

/// The dragged handle and where the pointer wants it (world space).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSolve {
    pub index: VertexIndex,
    pub position: Vec3,
}

/// What a frame callback did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Nothing was pending
    Idle,
    /// The dragged vertex is no longer a handle; the request was dropped
    Dropped { index: VertexIndex },
    Solved(FrameReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub dragged: VertexIndex,
    /// Handles plus anchors sent to the solver
    pub constraints: usize,
    pub iterations: u32,
}

/// Coalesces drag updates into at most one solve per frame.
#[derive(Debug, Clone)]
pub struct DeformationScheduler {
    task: CoalescedTask<PendingSolve>,
    iterations: u32,
}

impl DeformationScheduler {
    pub fn new(iterations: u32) -> Self {
        Self {
            task: CoalescedTask::new(),
            iterations,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Record the latest drag target. Returns whether a new frame was
    /// requested.
    pub fn on_handle_move(&mut self, index: VertexIndex, position: Vec3) -> bool {
        self.task.submit(PendingSolve { index, position })
    }

    pub fn is_scheduled(&self) -> bool {
        self.task.is_scheduled()
    }

    pub fn pending(&self) -> Option<&PendingSolve> {
        self.task.pending()
    }

    pub fn cancel(&mut self) {
        self.task.cancel();
    }

    /// Frame callback: run one solve for the latest pending drag target and
    /// write the result back to the mesh and the constraint targets.
    pub fn run_deformation(
        &mut self,
        mesh: &mut MeshStore,
        constraints: &mut ConstraintSet,
        session: &mut SolverSession,
    ) -> DeformResult<FrameOutcome> {
        let Some(request) = self.task.begin() else {
            return Ok(FrameOutcome::Idle);
        };

        if !constraints.is_handle(request.index) {
            debug!(
                "Dropping solve for vertex {}: no longer a handle",
                request.index
            );
            return Ok(FrameOutcome::Dropped {
                index: request.index,
            });
        }

        let snapshot = constraints.snapshot();
        let mut indices = Vec::with_capacity(snapshot.len());
        let mut positions = Vec::with_capacity(snapshot.len() * 3);
        for (&index, constraint) in snapshot {
            let world = if index == request.index {
                request.position
            } else {
                constraint.position
            };
            let local = mesh.to_local(world);
            if !world.is_finite() || !local.is_finite() {
                warn!("Skipping frame: non-finite target for vertex {}", index);
                return Err(DeformError::InvalidNumeric { index });
            }
            indices.push(index);
            positions.extend_from_slice(&local.to_array());
        }

        session.set_handles(&indices, &positions)?;
        session.solve(self.iterations)?;

        let Some(solved) = session.vertices()? else {
            return Err(DeformError::NoSolverResult);
        };
        mesh.apply_solved_vertices(&solved)?;

        for &index in &indices {
            let position = mesh.vertex_world_position(index)?;
            constraints.update_position(index, position);
        }

        let report = FrameReport {
            dragged: request.index,
            constraints: indices.len(),
            iterations: self.iterations,
        };
        debug!(
            "Solved frame: vertex {} dragged, {} constraints, {} iterations",
            report.dragged, report.constraints, report.iterations
        );
        Ok(FrameOutcome::Solved(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingLoader;
    use crate::types::ModelTransform;
    use glam::Quat;
    use marionette_ipc::SolverRequest;

    /// Three-vertex triangle at the origin: (0,0,0), (1,0,0), (0,1,0).
    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    async fn setup(result: Option<Vec<f32>>) -> (MeshStore, SolverSession, RecordingLoader) {
        let loader = RecordingLoader::new(result);
        let mut mesh = MeshStore::new();
        mesh.load(TRIANGLE.to_vec(), &[0, 1, 2]).unwrap();

        let mut session = SolverSession::new();
        session.init(&loader).await.unwrap();
        session.load_mesh(mesh.local_vertices(), &[0, 1, 2]).unwrap();
        (mesh, session, loader)
    }

    #[test]
    fn test_coalesced_task_overwrites() {
        let mut task = CoalescedTask::new();
        assert!(task.submit(1));
        assert!(!task.submit(2));
        assert!(!task.submit(3));
        assert!(task.is_scheduled());

        assert_eq!(task.begin(), Some(3));
        assert!(!task.is_scheduled());
        assert_eq!(task.begin(), None);

        assert!(task.submit(4));
        task.cancel();
        assert_eq!(task.begin(), None);
    }

    #[tokio::test]
    async fn test_idle_frame_does_not_call_solver() {
        let (mut mesh, mut session, loader) = setup(None).await;
        let mut constraints = ConstraintSet::new();
        let mut scheduler = DeformationScheduler::new(50);

        let outcome = scheduler
            .run_deformation(&mut mesh, &mut constraints, &mut session)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Idle);
        assert!(loader.solve_requests().is_empty());
    }

    #[tokio::test]
    async fn test_moves_coalesce_into_one_solve() {
        let solved = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let (mut mesh, mut session, loader) = setup(Some(solved)).await;
        let mut constraints = ConstraintSet::new();
        constraints.select_handle(0, Vec3::ZERO);
        let mut scheduler = DeformationScheduler::new(50);

        let targets: Vec<Vec3> = (1..=5).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let scheduled: Vec<bool> = targets
            .iter()
            .map(|&p| scheduler.on_handle_move(0, p))
            .collect();
        assert_eq!(scheduled, vec![true, false, false, false, false]);

        scheduler
            .run_deformation(&mut mesh, &mut constraints, &mut session)
            .unwrap();

        assert_eq!(
            loader.solve_requests(),
            vec![
                SolverRequest::SetHandles {
                    indices: vec![0],
                    positions: vec![5.0, 0.0, 0.0],
                },
                SolverRequest::Solve { max_iterations: 50 },
                SolverRequest::GetVertices,
            ]
        );
        assert!(!scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_drag_under_model_transform() {
        // Handle at vertex 0, no anchors, model translated by (10, 0, 0);
        // dragging to world (11, 0, 0) sends local (1, 0, 0)
        let solved = vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let (mut mesh, mut session, loader) = setup(Some(solved)).await;
        mesh.set_transform(ModelTransform::new(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::IDENTITY,
            1.0,
        ));
        let mut constraints = ConstraintSet::new();
        constraints.select_handle(0, Vec3::new(10.0, 0.0, 0.0));
        let mut scheduler = DeformationScheduler::new(50);

        scheduler.on_handle_move(0, Vec3::new(11.0, 0.0, 0.0));
        let outcome = scheduler
            .run_deformation(&mut mesh, &mut constraints, &mut session)
            .unwrap();

        assert_eq!(
            outcome,
            FrameOutcome::Solved(FrameReport {
                dragged: 0,
                constraints: 1,
                iterations: 50,
            })
        );
        let requests = loader.solve_requests();
        assert_eq!(
            requests[0],
            SolverRequest::SetHandles {
                indices: vec![0],
                positions: vec![1.0, 0.0, 0.0],
            }
        );
        let solves = requests
            .iter()
            .filter(|r| matches!(r, SolverRequest::Solve { max_iterations: 50 }))
            .count();
        assert_eq!(solves, 1);

        // Mesh and stored handle target follow the solved vertex
        assert_eq!(mesh.vertex_world_position(0).unwrap(), Vec3::new(11.0, 0.0, 0.0));
        assert_eq!(constraints.get(0).unwrap().position, Vec3::new(11.0, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_anchors_keep_stored_targets() {
        let solved = TRIANGLE.to_vec();
        let (mut mesh, mut session, loader) = setup(Some(solved)).await;
        let mut constraints = ConstraintSet::new();
        constraints.toggle_anchor(1, Vec3::new(1.0, 0.0, 0.0));
        constraints.select_handle(2, Vec3::new(0.0, 1.0, 0.0));
        let mut scheduler = DeformationScheduler::new(7);

        scheduler.on_handle_move(2, Vec3::new(0.0, 2.0, 0.0));
        scheduler
            .run_deformation(&mut mesh, &mut constraints, &mut session)
            .unwrap();

        assert_eq!(
            loader.solve_requests()[..2],
            [
                SolverRequest::SetHandles {
                    indices: vec![1, 2],
                    positions: vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0],
                },
                SolverRequest::Solve { max_iterations: 7 },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_result_leaves_mesh_unchanged() {
        let (mut mesh, mut session, _loader) = setup(None).await;
        let mut constraints = ConstraintSet::new();
        constraints.select_handle(0, Vec3::ZERO);
        let mut scheduler = DeformationScheduler::new(50);
        let before = mesh.local_vertices().to_vec();
        let revision = mesh.revision();

        scheduler.on_handle_move(0, Vec3::new(3.0, 0.0, 0.0));
        let result = scheduler.run_deformation(&mut mesh, &mut constraints, &mut session);

        assert_eq!(result, Err(DeformError::NoSolverResult));
        assert_eq!(mesh.local_vertices(), &before[..]);
        assert_eq!(mesh.revision(), revision);
        assert_eq!(constraints.get(0).unwrap().position, Vec3::ZERO);
        assert!(!scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_non_finite_result_leaves_mesh_and_targets() {
        let mut solved = TRIANGLE.to_vec();
        solved[0] = f32::NAN;
        let (mut mesh, mut session, loader) = setup(Some(solved)).await;
        let mut constraints = ConstraintSet::new();
        constraints.toggle_anchor(0, Vec3::ZERO);
        constraints.select_handle(2, Vec3::new(0.0, 1.0, 0.0));
        let mut scheduler = DeformationScheduler::new(50);
        let revision = mesh.revision();

        scheduler.on_handle_move(2, Vec3::new(0.0, 2.0, 0.0));
        let result = scheduler.run_deformation(&mut mesh, &mut constraints, &mut session);

        assert_eq!(result, Err(DeformError::InvalidNumeric { index: 0 }));
        assert_eq!(mesh.local_vertices(), &TRIANGLE[..]);
        assert_eq!(mesh.revision(), revision);
        assert_eq!(constraints.get(0).unwrap().position, Vec3::ZERO);
        assert_eq!(constraints.get(2).unwrap().position, Vec3::new(0.0, 1.0, 0.0));

        // Targets stayed finite, so the next move still reaches the solver
        scheduler.on_handle_move(2, Vec3::new(0.0, 3.0, 0.0));
        let _ = scheduler.run_deformation(&mut mesh, &mut constraints, &mut session);
        let uploads = loader
            .solve_requests()
            .iter()
            .filter(|r| matches!(r, SolverRequest::SetHandles { .. }))
            .count();
        assert_eq!(uploads, 2);
    }

    #[tokio::test]
    async fn test_non_finite_target_skips_solver() {
        let (mut mesh, mut session, loader) = setup(None).await;
        let mut constraints = ConstraintSet::new();
        constraints.select_handle(0, Vec3::ZERO);
        let mut scheduler = DeformationScheduler::new(50);

        scheduler.on_handle_move(0, Vec3::new(f32::NAN, 0.0, 0.0));
        let result = scheduler.run_deformation(&mut mesh, &mut constraints, &mut session);

        assert_eq!(result, Err(DeformError::InvalidNumeric { index: 0 }));
        assert!(loader.solve_requests().is_empty());
        assert!(!scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_request_for_removed_handle_is_dropped() {
        let (mut mesh, mut session, loader) = setup(None).await;
        let mut constraints = ConstraintSet::new();
        constraints.select_handle(0, Vec3::ZERO);
        let mut scheduler = DeformationScheduler::new(50);

        scheduler.on_handle_move(0, Vec3::X);
        constraints.clear();
        let outcome = scheduler
            .run_deformation(&mut mesh, &mut constraints, &mut session)
            .unwrap();

        assert_eq!(outcome, FrameOutcome::Dropped { index: 0 });
        assert!(loader.solve_requests().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_sized_result_is_rejected() {
        let (mut mesh, mut session, _loader) = setup(Some(vec![0.0; 6])).await;
        let mut constraints = ConstraintSet::new();
        constraints.select_handle(0, Vec3::ZERO);
        let mut scheduler = DeformationScheduler::new(50);

        scheduler.on_handle_move(0, Vec3::X);
        let result = scheduler.run_deformation(&mut mesh, &mut constraints, &mut session);
        assert_eq!(
            result,
            Err(DeformError::SizeMismatch {
                expected: 9,
                actual: 6,
            })
        );
        assert_eq!(mesh.local_vertices(), &TRIANGLE[..]);
    }
}
