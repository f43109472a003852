//! Orbit camera and the camera state handed to picking
//!
//! Controls:
//! - Middle mouse drag: Orbit around target
//! - Shift + Middle mouse drag: Pan
//! - Scroll wheel: Dolly

use bevy::input::mouse::{MouseButton, MouseMotion, MouseWheel};
use bevy::prelude::*;
use deformation::CameraPose;

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Spherical orbit around a target point
#[derive(Component, Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Angle around Y in radians
    pub yaw: f32,
    /// Elevation above the horizontal in radians
    pub pitch: f32,
    /// Radians per pixel
    pub orbit_sensitivity: f32,
    /// World units per pixel at unit distance
    pub pan_sensitivity: f32,
    /// Fraction of the distance per scroll line
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 4.0,
            yaw: 0.0,
            pitch: 0.35,
            orbit_sensitivity: 0.005,
            pan_sensitivity: 0.0015,
            zoom_sensitivity: 0.1,
            min_distance: 0.5,
            max_distance: 100.0,
        }
    }
}

impl OrbitCamera {
    /// Camera position from the orbit parameters
    pub fn position(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        self.target + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position()).looking_at(self.target, Vec3::Y)
    }

    fn orbit(&mut self, delta: Vec2) {
        self.yaw -= delta.x * self.orbit_sensitivity;
        // Stay just short of the poles so looking_at never degenerates
        self.pitch = (self.pitch - delta.y * self.orbit_sensitivity).clamp(-1.5, 1.5);
    }

    fn pan(&mut self, delta: Vec2, rotation: Quat) {
        let right = rotation * Vec3::X;
        let up = rotation * Vec3::Y;
        self.target += (up * delta.y - right * delta.x) * self.pan_sensitivity * self.distance;
    }

    fn dolly(&mut self, lines: f32) {
        let factor = 1.0 - lines * self.zoom_sensitivity;
        self.distance = (self.distance * factor).clamp(self.min_distance, self.max_distance);
    }
}

/// Picking state for a perspective camera. `None` for orthographic cameras.
pub fn camera_pose(projection: &Projection, transform: &GlobalTransform) -> Option<CameraPose> {
    let Projection::Perspective(perspective) = projection else {
        return None;
    };
    let (_, rotation, translation) = transform.to_scale_rotation_translation();
    Some(CameraPose {
        position: deformation::glam::Vec3::from_array(translation.to_array()),
        rotation: deformation::glam::Quat::from_array(rotation.to_array()),
        fov_y: perspective.fov,
        aspect: perspective.aspect_ratio,
        near: perspective.near,
        far: perspective.far,
    })
}

pub struct CameraControllerPlugin;

impl Plugin for CameraControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (orbit_camera_input, apply_orbit_camera).chain());
    }
}

/// Middle mouse orbits (pans with Shift), the wheel dollies
fn orbit_camera_input(
    mouse_button: Res<ButtonInput<MouseButton>>,
    key_input: Res<ButtonInput<KeyCode>>,
    mut motion_events: MessageReader<MouseMotion>,
    mut scroll_events: MessageReader<MouseWheel>,
    mut camera_query: Query<(&mut OrbitCamera, &Transform), With<MainCamera>>,
) {
    let delta: Vec2 = motion_events.read().map(|e| e.delta).sum();
    let scroll: f32 = scroll_events.read().map(|e| e.y).sum();
    let dragging = mouse_button.pressed(MouseButton::Middle) && delta != Vec2::ZERO;
    if !dragging && scroll == 0.0 {
        return;
    }

    let shift = key_input.pressed(KeyCode::ShiftLeft) || key_input.pressed(KeyCode::ShiftRight);
    for (mut orbit, transform) in camera_query.iter_mut() {
        if dragging {
            if shift {
                orbit.pan(delta, transform.rotation);
            } else {
                orbit.orbit(delta);
            }
        }
        if scroll != 0.0 {
            orbit.dolly(scroll);
        }
    }
}

fn apply_orbit_camera(
    mut camera_query: Query<
        (&OrbitCamera, &mut Transform),
        (With<MainCamera>, Changed<OrbitCamera>),
    >,
) {
    for (orbit, mut transform) in camera_query.iter_mut() {
        *transform = orbit.transform();
    }
}
