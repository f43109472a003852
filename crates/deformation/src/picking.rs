//! Pointer picking: camera rays, ray-mesh intersection and vertex resolution.
//!
//! Everything here works in world space. Triangles are intersected with the
//! Moller-Trumbore algorithm against the live (deformed, transformed) mesh.

use glam::{Mat3, Quat, Vec2, Vec3};

use crate::mesh_store::MeshStore;
use crate::types::VertexIndex;

/// Epsilon for floating point comparisons in ray intersection
const EPSILON: f32 = 1e-6;

/// A half-line with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray; `direction` is normalized.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Perspective camera state needed to turn pointer coordinates into rays.
///
/// The camera looks down its local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraPose {
    /// Camera at `eye` looking at `target`.
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - eye).normalize();
        let right = forward.cross(up).normalize();
        let true_up = right.cross(forward);
        Self {
            position: eye,
            rotation: Quat::from_mat3(&Mat3::from_cols(right, true_up, -forward)),
            ..Self::default()
        }
    }

    /// World-space direction the camera is facing.
    pub fn view_direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Ray from the camera through normalized device coordinates in
    /// `[-1, 1]` on both axes (+Y up).
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let tan_half = (self.fov_y * 0.5).tan();
        let view_dir = Vec3::new(ndc.x * tan_half * self.aspect, ndc.y * tan_half, -1.0);
        Ray::new(self.position, self.rotation * view_dir)
    }
}

/// Result of a ray-triangle intersection test
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Distance along the ray to the intersection point
    pub t: f32,
    /// Barycentric coordinate u (weight for vertex 1)
    pub u: f32,
    /// Barycentric coordinate v (weight for vertex 2)
    pub v: f32,
}

/// Moller-Trumbore ray-triangle intersection algorithm.
///
/// Returns the hit distance and barycentric coordinates if the ray intersects
/// the triangle in front of its origin. Both faces are hit (no culling).
pub fn ray_triangle_intersection(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<TriangleHit> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);

    // Ray lies in the triangle's plane or misses
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.origin - v0;

    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < EPSILON {
        return None;
    }

    Some(TriangleHit { t, u, v })
}

/// Closest intersection of a ray with the mesh surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// World-space intersection point
    pub point: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
    /// Index of the intersected triangle
    pub face: usize,
}

/// Cast a world-space ray against the mesh and return the first hit in depth
/// order.
pub fn raycast_mesh(ray: &Ray, mesh: &MeshStore) -> Option<SurfaceHit> {
    let world: Vec<Vec3> = mesh.world_positions().collect();
    let mut closest: Option<(TriangleHit, usize)> = None;

    // Brute force over all triangles; interactive meshes are small enough
    for (face, &[a, b, c]) in mesh.faces().iter().enumerate() {
        let Some(hit) = ray_triangle_intersection(
            ray,
            world[a as usize],
            world[b as usize],
            world[c as usize],
        ) else {
            continue;
        };

        let dominated = closest.as_ref().is_some_and(|(prev, _)| hit.t >= prev.t);
        if !dominated {
            closest = Some((hit, face));
        }
    }

    closest.map(|(hit, face)| SurfaceHit {
        point: ray.at(hit.t),
        distance: hit.t,
        face,
    })
}

/// Vertex with minimum squared world distance to `point` (linear scan).
pub fn nearest_vertex(point: Vec3, mesh: &MeshStore) -> Option<VertexIndex> {
    mesh.world_positions()
        .enumerate()
        .map(|(i, p)| (i, p.distance_squared(point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i as VertexIndex)
}

/// Resolve a pointer position to the mesh vertex closest to the surface point
/// under it. `None` if the ray misses the mesh.
pub fn pick_vertex(ndc: Vec2, camera: &CameraPose, mesh: &MeshStore) -> Option<VertexIndex> {
    let ray = camera.ray_from_ndc(ndc);
    let hit = raycast_mesh(&ray, mesh)?;
    nearest_vertex(hit.point, mesh)
}

/// Distance along `ray` to the first intersection with a sphere, if any.
fn ray_sphere_distance(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let near = -b - sqrt_d;
    let far = -b + sqrt_d;
    if near >= 0.0 {
        Some(near)
    } else if far >= 0.0 {
        // Origin inside the sphere
        Some(0.0)
    } else {
        None
    }
}

/// Pick among marker spheres of `radius` centered on the given world
/// positions. The marker nearest along the ray wins.
pub fn pick_marker(
    ray: &Ray,
    markers: impl IntoIterator<Item = (VertexIndex, Vec3)>,
    radius: f32,
) -> Option<VertexIndex> {
    markers
        .into_iter()
        .filter_map(|(index, center)| ray_sphere_distance(ray, center, radius).map(|t| (index, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Plane a dragged handle moves in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragPlane {
    pub point: Vec3,
    pub normal: Vec3,
}

impl DragPlane {
    /// Plane through `point` facing the camera.
    pub fn facing_camera(point: Vec3, camera: &CameraPose) -> Self {
        Self {
            point,
            normal: camera.view_direction().normalize(),
        }
    }

    /// Where `ray` crosses the plane, if in front of the ray origin.
    pub fn intersect(&self, ray: &Ray) -> Option<Vec3> {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < EPSILON {
            return None;
        }
        let t = self.normal.dot(self.point - ray.origin) / denom;
        (t >= 0.0).then(|| ray.at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelTransform;

    /// Unit quad split into a fan around a center vertex (index 4).
    fn fan_quad() -> MeshStore {
        let vertices = vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.5, 0.5, 0.0,
        ];
        let faces = [0, 1, 4, 1, 2, 4, 2, 3, 4, 3, 0, 4];
        let mut mesh = MeshStore::new();
        mesh.load(vertices, &faces).unwrap();
        mesh
    }

    fn camera_above(x: f32, y: f32) -> CameraPose {
        CameraPose::looking_at(Vec3::new(x, y, 5.0), Vec3::new(x, y, 0.0), Vec3::Y)
    }

    #[test]
    fn test_ray_triangle_hit() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z);
        let hit = ray_triangle_intersection(&ray, Vec3::ZERO, Vec3::X, Vec3::Y).unwrap();
        assert!((hit.t - 1.0).abs() < EPSILON);
        assert!((hit.u - 0.25).abs() < EPSILON);
        assert!((hit.v - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_ray_triangle_behind() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::Z);
        assert!(ray_triangle_intersection(&ray, Vec3::ZERO, Vec3::X, Vec3::Y).is_none());
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = CameraPose::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let ray = camera.ray_from_ndc(Vec2::ZERO);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-6);
        assert!((camera.view_direction() - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn test_edge_ray_matches_fov() {
        let camera = CameraPose {
            fov_y: std::f32::consts::FRAC_PI_2,
            aspect: 1.0,
            ..CameraPose::default()
        };
        let ray = camera.ray_from_ndc(Vec2::new(1.0, 0.0));
        let expected = Vec3::new(1.0, 0.0, -1.0).normalize();
        assert!((ray.direction - expected).length() < 1e-5);
    }

    #[test]
    fn test_pick_miss_returns_none() {
        let mesh = fan_quad();
        let camera = camera_above(3.0, 3.0);
        assert_eq!(pick_vertex(Vec2::ZERO, &camera, &mesh), None);
    }

    #[test]
    fn test_pick_exactly_at_vertex() {
        let mesh = fan_quad();
        let camera = camera_above(0.5, 0.5);
        assert_eq!(pick_vertex(Vec2::ZERO, &camera, &mesh), Some(4));
    }

    #[test]
    fn test_pick_resolves_nearest_vertex() {
        let mesh = fan_quad();
        assert_eq!(pick_vertex(Vec2::ZERO, &camera_above(0.9, 0.85), &mesh), Some(2));
        assert_eq!(pick_vertex(Vec2::ZERO, &camera_above(0.1, 0.2), &mesh), Some(0));
    }

    #[test]
    fn test_pick_uses_model_transform() {
        let mut mesh = fan_quad();
        mesh.set_transform(ModelTransform::new(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::IDENTITY,
            1.0,
        ));
        assert_eq!(pick_vertex(Vec2::ZERO, &camera_above(0.5, 0.5), &mesh), None);
        assert_eq!(pick_vertex(Vec2::ZERO, &camera_above(10.5, 0.5), &mesh), Some(4));
    }

    #[test]
    fn test_raycast_takes_first_hit_in_depth() {
        // Two stacked triangles at z=0 and z=1
        let vertices = vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0,
        ];
        let mut mesh = MeshStore::new();
        mesh.load(vertices, &[0, 1, 2, 3, 4, 5]).unwrap();

        let ray = Ray::new(Vec3::new(0.2, 0.2, 5.0), Vec3::NEG_Z);
        let hit = raycast_mesh(&ray, &mesh).unwrap();
        assert_eq!(hit.face, 1);
        assert!((hit.distance - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_pick_marker_prefers_nearest_along_ray() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let markers = [(7, Vec3::ZERO), (3, Vec3::new(0.0, 0.0, 2.0)), (9, Vec3::X)];
        assert_eq!(pick_marker(&ray, markers, 0.1), Some(3));
        assert_eq!(pick_marker(&ray, [(9, Vec3::X)], 0.1), None);
    }

    #[test]
    fn test_drag_plane_intersection() {
        let camera = CameraPose::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let plane = DragPlane::facing_camera(Vec3::new(0.0, 0.0, 1.0), &camera);

        let ray = Ray::new(Vec3::new(2.0, 3.0, 5.0), Vec3::NEG_Z);
        let point = plane.intersect(&ray).unwrap();
        assert!((point - Vec3::new(2.0, 3.0, 1.0)).length() < 1e-5);

        // Parallel and backwards rays miss
        assert!(plane.intersect(&Ray::new(Vec3::ZERO, Vec3::X)).is_none());
        assert!(plane.intersect(&Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z)).is_none());
    }
}
