//! Scene setup for Marionette
//!
//! Wires the deformation pipeline into a Bevy app: orbit camera, pointer
//! input, frame-driven solving with mesh write-back, and constraint markers.

use bevy::prelude::*;
use marionette_ipc::SceneToUi;

mod camera;
mod deform;
mod markers;

pub use camera::{camera_pose, CameraControllerPlugin, MainCamera, OrbitCamera};
pub use deform::{
    cursor_to_ndc, extract_mesh_buffers, write_mesh_buffers, DeformPlugin, DeformRig,
    DeformTarget, DeformTargetState, UiCommand,
};
pub use markers::MarkerPlugin;

/// Resource for queuing messages to send to the UI
/// The host drains this and forwards to whatever shell it runs
#[derive(Resource, Default)]
pub struct OutboundUiMessages {
    pub messages: Vec<SceneToUi>,
}

impl OutboundUiMessages {
    /// Queue a message to be sent to the UI
    pub fn send(&mut self, msg: SceneToUi) {
        self.messages.push(msg);
    }

    /// Take all queued messages, leaving the queue empty
    pub fn drain(&mut self) -> Vec<SceneToUi> {
        std::mem::take(&mut self.messages)
    }
}

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OutboundUiMessages>();

        app.add_plugins(CameraControllerPlugin);
        app.add_plugins(DeformPlugin);
        app.add_plugins(MarkerPlugin);

        app.add_systems(Startup, setup_scene);
    }
}

/// Camera, light, ground and a deformable sphere
fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let orbit_camera = OrbitCamera::default();
    commands.spawn((
        Camera3d::default(),
        orbit_camera.transform(),
        MainCamera,
        orbit_camera,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(3.0, 6.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(10.0, 10.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.3, 0.3, 0.3),
            perceptual_roughness: 0.8,
            ..default()
        })),
        Transform::from_xyz(0.0, -1.0, 0.0),
    ));

    // Icosphere: no duplicated seam vertices, so deformation stays watertight
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(0.75).mesh().build())),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.8, 0.45, 0.3),
            perceptual_roughness: 0.5,
            ..default()
        })),
        Transform::default(),
        Name::new("Deformable"),
        DeformTarget,
    ));

    info!("Scene initialized; press 2 to select, 3 to deform");
}
