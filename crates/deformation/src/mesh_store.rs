//! Authoritative mesh buffers and the model-to-world transform.
//!
//! Vertices are stored flat in model-local space (three floats per vertex),
//! exactly as they travel to and from the solver. World positions are derived
//! on demand from the current [`ModelTransform`], never cached.

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::error::{DeformError, DeformResult};
use crate::types::{as_points, ModelTransform, VertexIndex};

/// Identifies a successfully loaded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHandle {
    /// Increases with every load, starting at 1
    pub mesh_id: u64,
    pub vertex_count: usize,
    pub face_count: usize,
}

/// Owns the live mesh: local vertex buffer, triangle list, vertex normals and
/// model transform.
#[derive(Debug, Clone, Default)]
pub struct MeshStore {
    vertices: Vec<f32>,
    faces: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    transform: ModelTransform,
    /// Id of the loaded mesh, 0 while empty
    mesh_id: u64,
    /// Bumped whenever the vertex buffer changes
    revision: u64,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current mesh.
    ///
    /// `faces` is a flat triangle index buffer. On error the previous mesh is
    /// kept untouched.
    pub fn load(&mut self, vertices: Vec<f32>, faces: &[u32]) -> DeformResult<MeshHandle> {
        if vertices.is_empty() {
            return Err(DeformError::InvalidMesh("mesh has no vertices".into()));
        }
        if vertices.len() % 3 != 0 {
            return Err(DeformError::InvalidMesh(format!(
                "vertex buffer length {} is not a multiple of 3",
                vertices.len()
            )));
        }
        if faces.len() % 3 != 0 {
            return Err(DeformError::InvalidMesh(format!(
                "face buffer length {} is not a multiple of 3",
                faces.len()
            )));
        }
        if let Some(pos) = vertices.iter().position(|v| !v.is_finite()) {
            return Err(DeformError::InvalidMesh(format!(
                "vertex {} has a non-finite coordinate",
                pos / 3
            )));
        }

        let vertex_count = vertices.len() / 3;
        if let Some(&bad) = faces.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(DeformError::InvalidMesh(format!(
                "face index {bad} out of range (vertex count {vertex_count})"
            )));
        }

        self.vertices = vertices;
        self.faces = faces
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
            .collect();
        self.recompute_normals();
        self.mesh_id += 1;
        self.revision += 1;

        info!(
            "Loaded mesh {} ({} vertices, {} faces)",
            self.mesh_id,
            vertex_count,
            self.faces.len()
        );

        Ok(self.handle())
    }

    /// Handle of the currently loaded mesh, if any.
    pub fn current(&self) -> Option<MeshHandle> {
        self.is_loaded().then(|| self.handle())
    }

    fn handle(&self) -> MeshHandle {
        MeshHandle {
            mesh_id: self.mesh_id,
            vertex_count: self.vertex_count(),
            face_count: self.faces.len(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Flat local-space vertex buffer.
    pub fn local_vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Area-weighted vertex normals in local space.
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn transform(&self) -> ModelTransform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: ModelTransform) {
        self.transform = transform;
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.transform.transform_point(local)
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        self.transform.inverse_transform_point(world)
    }

    pub fn vertex_local_position(&self, index: VertexIndex) -> DeformResult<Vec3> {
        as_points(&self.vertices)
            .get(index as usize)
            .map(|&p| Vec3::from_array(p))
            .ok_or(DeformError::IndexOutOfRange {
                index,
                count: self.vertex_count(),
            })
    }

    pub fn vertex_world_position(&self, index: VertexIndex) -> DeformResult<Vec3> {
        self.vertex_local_position(index).map(|p| self.to_world(p))
    }

    /// All vertices in world space, in index order.
    pub fn world_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        as_points(&self.vertices)
            .iter()
            .map(move |&p| self.to_world(Vec3::from_array(p)))
    }

    /// Replace the local vertex buffer with a solver result.
    pub fn apply_solved_vertices(&mut self, buffer: &[f32]) -> DeformResult<()> {
        if buffer.len() != self.vertices.len() {
            return Err(DeformError::SizeMismatch {
                expected: self.vertices.len(),
                actual: buffer.len(),
            });
        }
        if let Some(pos) = buffer.iter().position(|v| !v.is_finite()) {
            warn!("Rejecting solved vertices: vertex {} is non-finite", pos / 3);
            return Err(DeformError::InvalidNumeric {
                index: (pos / 3) as VertexIndex,
            });
        }

        self.vertices.copy_from_slice(buffer);
        self.recompute_normals();
        self.revision += 1;
        debug!("Applied solved vertices (revision {})", self.revision);
        Ok(())
    }

    /// Accumulate area-weighted face normals per vertex.
    ///
    /// The cross product magnitude is twice the triangle area, so summing the
    /// unnormalized cross products weights by area.
    fn recompute_normals(&mut self) {
        let points = as_points(&self.vertices);
        let mut accum = vec![Vec3::ZERO; points.len()];

        for &[a, b, c] in &self.faces {
            let pa = Vec3::from_array(points[a as usize]);
            let pb = Vec3::from_array(points[b as usize]);
            let pc = Vec3::from_array(points[c as usize]);
            let weighted = (pb - pa).cross(pc - pa);
            accum[a as usize] += weighted;
            accum[b as usize] += weighted;
            accum[c as usize] += weighted;
        }

        self.normals = accum.into_iter().map(Vec3::normalize_or_zero).collect();
    }
}
