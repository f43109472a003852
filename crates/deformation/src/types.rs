//! Core deformation types shared across the pipeline.

use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Index of a vertex in the loaded mesh, stable until the next load.
pub type VertexIndex = u32;

/// Role of a constrained vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintRole {
    /// Dragged by the user
    Handle,
    /// Pinned in place
    Anchor,
}

/// A constrained vertex and its target position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub role: ConstraintRole,
    pub position: Vec3,
}

/// Uniform-scale rigid transform from model-local space to world space.
///
/// Independent of per-vertex deformation; the solver only ever sees local
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ModelTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Local-to-world affine matrix.
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }

    /// Whether the transform can be inverted (finite, non-zero scale).
    pub fn is_invertible(&self) -> bool {
        self.scale.is_finite()
            && self.scale.abs() > f32::EPSILON
            && self.translation.is_finite()
            && self.rotation.is_finite()
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.rotation * (local * self.scale) + self.translation
    }

    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        (self.rotation.inverse() * (world - self.translation)) / self.scale
    }
}

/// View a flat `[x0, y0, z0, x1, ...]` buffer as points.
///
/// The caller guarantees the length is a multiple of three.
pub(crate) fn as_points(buffer: &[f32]) -> &[[f32; 3]] {
    bytemuck::cast_slice(buffer)
}
