//! Handle/anchor mesh deformation for Marionette.
//!
//! This crate turns pointer input into solver calls:
//! - Vertex picking against the live, transformed mesh
//! - Handle and anchor constraint bookkeeping
//! - A View / Select / Deform interaction state machine
//! - Frame-coalesced solving (at most one solve per rendered frame)
//! - A lifecycle facade around an external solver engine
//!
//! # Architecture
//!
//! The solver works in model-local space; picking and constraint targets live
//! in world space. [`MeshStore`] owns the conversion between the two and is
//! the only place vertices change.
//!
//! ## Key Components
//!
//! - **Mesh Store**: vertex/face buffers, normals, model transform
//! - **Constraints**: disjoint handle and anchor sets with world targets
//! - **Picking**: camera rays, Moller-Trumbore, nearest-vertex resolution
//! - **Interaction**: pointer events → constraint edits and drag targets
//! - **Scheduler**: latest-wins drag coalescing and result write-back
//! - **Session**: engine load, mesh upload, solve, dispose
//! - **Rig**: all of the above wired together for a host

pub mod constraints;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod mesh_store;
pub mod picking;
pub mod rig;
pub mod scheduler;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use glam;

pub use constraints::{AnchorToggle, ConstraintSet};
pub use engine::{RelaxationEngine, RelaxationLoader};
pub use error::{DeformError, DeformResult};
pub use interaction::{
    DragSession, InteractionMachine, InteractionOutcome, PointerEvent, PointerKind,
};
pub use mesh_store::{MeshHandle, MeshStore};
pub use picking::{pick_marker, pick_vertex, CameraPose, DragPlane, Ray, SurfaceHit};
pub use rig::DeformationRig;
pub use scheduler::{CoalescedTask, DeformationScheduler, FrameOutcome, FrameReport, PendingSolve};
pub use session::{EngineLoader, InitOutcome, InitTicket, SolverEngine, SolverSession};
pub use types::{Constraint, ConstraintRole, ModelTransform, VertexIndex};
