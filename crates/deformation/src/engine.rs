//! In-process reference solver engine.
//!
//! Pins every constrained vertex at its target and spreads the resulting
//! displacement over the mesh's edge graph, one Jacobi averaging sweep per
//! iteration. Not a shape-preserving solver, but it honors the full request
//! contract and keeps the interactive pipeline usable without an external
//! numerical module.

use glam::Vec3;
use marionette_ipc::{SessionId, SolverFault, SolverRequest, SolverResponse};
use tracing::debug;

use crate::session::{EngineLoader, SolverEngine};

struct RelaxMesh {
    rest: Vec<Vec3>,
    /// Displacement from rest, warm-started across solves
    offsets: Vec<Vec3>,
    neighbors: Vec<Vec<u32>>,
    pins: Vec<(u32, Vec3)>,
    solved: bool,
}

impl RelaxMesh {
    fn build(vertices: &[f32], faces: &[u32]) -> Result<Self, SolverFault> {
        if vertices.is_empty() || vertices.len() % 3 != 0 {
            return Err(SolverFault::InvalidMesh(format!(
                "vertex buffer length {} is not a positive multiple of 3",
                vertices.len()
            )));
        }
        if faces.len() % 3 != 0 {
            return Err(SolverFault::InvalidMesh(format!(
                "face buffer length {} is not a multiple of 3",
                faces.len()
            )));
        }

        let count = vertices.len() / 3;
        if let Some(&bad) = faces.iter().find(|&&i| i as usize >= count) {
            return Err(SolverFault::InvalidMesh(format!(
                "face index {} out of range ({} vertices)",
                bad, count
            )));
        }

        let rest: Vec<Vec3> = vertices
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();

        let mut neighbors = vec![Vec::new(); count];
        for tri in faces.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                neighbors[a as usize].push(b);
                neighbors[b as usize].push(a);
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self {
            offsets: vec![Vec3::ZERO; count],
            rest,
            neighbors,
            pins: Vec::new(),
            solved: false,
        })
    }

    fn relax(&mut self, iterations: u32) {
        let mut pinned = vec![false; self.rest.len()];
        for &(index, target) in &self.pins {
            let i = index as usize;
            self.offsets[i] = target - self.rest[i];
            pinned[i] = true;
        }

        let mut next = self.offsets.clone();
        for _ in 0..iterations {
            for (i, list) in self.neighbors.iter().enumerate() {
                if pinned[i] || list.is_empty() {
                    continue;
                }
                let sum: Vec3 = list.iter().map(|&n| self.offsets[n as usize]).sum();
                next[i] = sum / list.len() as f32;
            }
            std::mem::swap(&mut self.offsets, &mut next);
        }
        self.solved = true;
    }

    fn positions(&self) -> Vec<f32> {
        self.rest
            .iter()
            .zip(&self.offsets)
            .flat_map(|(r, o)| (*r + *o).to_array())
            .collect()
    }
}

/// Displacement-diffusion engine used when no external solver is wired in.
#[derive(Default)]
pub struct RelaxationEngine {
    mesh: Option<RelaxMesh>,
    next_session: SessionId,
}

impl RelaxationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn mesh_mut(&mut self) -> Result<&mut RelaxMesh, SolverFault> {
        self.mesh.as_mut().ok_or(SolverFault::NoSession)
    }
}

impl SolverEngine for RelaxationEngine {
    fn handle(&mut self, request: SolverRequest) -> Result<SolverResponse, SolverFault> {
        match request {
            SolverRequest::LoadMesh { vertices, faces } => {
                self.mesh = Some(RelaxMesh::build(&vertices, &faces)?);
                self.next_session += 1;
                Ok(SolverResponse::SessionCreated {
                    session: self.next_session,
                })
            }
            SolverRequest::SetHandles { indices, positions } => {
                let mesh = self.mesh_mut()?;
                if positions.len() != indices.len() * 3 {
                    return Err(SolverFault::Malformed(format!(
                        "{} indices but {} position floats",
                        indices.len(),
                        positions.len()
                    )));
                }
                if let Some(&bad) = indices.iter().find(|&&i| i as usize >= mesh.rest.len()) {
                    return Err(SolverFault::Malformed(format!(
                        "handle index {} out of range",
                        bad
                    )));
                }
                mesh.pins = indices
                    .iter()
                    .zip(positions.chunks_exact(3))
                    .map(|(&i, p)| (i, Vec3::new(p[0], p[1], p[2])))
                    .collect();
                Ok(SolverResponse::Ack)
            }
            SolverRequest::Solve { max_iterations } => {
                let mesh = self.mesh_mut()?;
                mesh.relax(max_iterations);
                debug!(
                    "Relaxation solve: {} iterations, {} pins",
                    max_iterations,
                    mesh.pins.len()
                );
                Ok(SolverResponse::Ack)
            }
            SolverRequest::GetVertices => {
                let mesh = self.mesh_mut()?;
                Ok(SolverResponse::Vertices(
                    mesh.solved.then(|| mesh.positions()),
                ))
            }
            SolverRequest::Dispose => {
                self.mesh = None;
                Ok(SolverResponse::Ack)
            }
        }
    }
}

/// Loader for [`RelaxationEngine`]; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxationLoader;

impl EngineLoader for RelaxationLoader {
    type Engine = RelaxationEngine;

    async fn load(&self) -> Result<Self::Engine, SolverFault> {
        Ok(RelaxationEngine::new())
    }
}
