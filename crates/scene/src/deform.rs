//! Deformation rig wired into the Bevy scene
//!
//! - 1 / 2 / 3: View / Select / Deform mode
//! - Select mode: Shift+click picks a handle, Ctrl+click toggles an anchor
//! - Deform mode: drag a handle marker with the left mouse button
//! - Escape: clear the selection
//!
//! The rig keeps the authoritative vertex buffer; solved vertices are copied
//! back into the target's mesh asset whenever its revision moves.

use bevy::ecs::message::Message;
use bevy::input::mouse::MouseButton;
use bevy::mesh::{Indices, PrimitiveTopology, VertexAttributeValues};
use bevy::prelude::*;
use bevy::window::{CursorMoved, PrimaryWindow};
use deformation::glam;
use deformation::{
    DeformationRig, FrameOutcome, MeshStore, ModelTransform, PointerEvent, RelaxationLoader,
};
use marionette_config::DeformConfig;
use marionette_ipc::{InteractionMode, Modifiers, UiToScene};

use crate::camera::{camera_pose, MainCamera};
use crate::OutboundUiMessages;

/// The deformation pipeline as a Bevy resource
#[derive(Resource, Debug)]
pub struct DeformRig(pub DeformationRig);

impl FromWorld for DeformRig {
    fn from_world(world: &mut World) -> Self {
        let config = world
            .get_resource::<DeformConfig>()
            .cloned()
            .unwrap_or_default();
        Self(DeformationRig::new(&config))
    }
}

/// Marks the single mesh entity the rig deforms
#[derive(Component, Default)]
pub struct DeformTarget;

/// Which entity and mesh asset the rig is bound to
#[derive(Resource, Default)]
pub struct DeformTargetState {
    pub entity: Option<Entity>,
    pub mesh: Option<Handle<Mesh>>,
    /// Mesh store revision last copied into the asset
    pub synced_revision: u64,
}

/// Command from the UI shell, routed to the rig
#[derive(Message, Debug, Clone)]
pub struct UiCommand(pub UiToScene);

pub struct DeformPlugin;

impl Plugin for DeformPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DeformConfig>()
            .init_resource::<DeformRig>()
            .init_resource::<DeformTargetState>()
            .add_message::<UiCommand>()
            .add_systems(Startup, load_solver_engine)
            .add_systems(
                Update,
                (
                    bind_deform_target,
                    sync_model_transform,
                    handle_mode_hotkeys,
                    apply_ui_commands,
                    handle_pointer_input,
                    run_deform_frame,
                    write_back_mesh,
                    forward_rig_messages,
                )
                    .chain(),
            );
    }
}

/// Bring up the in-process solver engine
fn load_solver_engine(mut rig: ResMut<DeformRig>) {
    match pollster::block_on(rig.0.init_engine(&RelaxationLoader)) {
        Ok(outcome) => debug!("Solver engine init: {:?}", outcome),
        Err(err) => error!("Deformation disabled: {}", err),
    }
}

/// Load the target's mesh into the rig once its asset is available
fn bind_deform_target(
    targets: Query<(Entity, &Mesh3d, &Transform), With<DeformTarget>>,
    meshes: Res<Assets<Mesh>>,
    mut rig: ResMut<DeformRig>,
    mut state: ResMut<DeformTargetState>,
) {
    let Ok((entity, mesh3d, transform)) = targets.single() else {
        return;
    };
    if state.entity == Some(entity) && state.mesh.as_ref() == Some(&mesh3d.0) {
        return;
    }

    // Asset may still be loading
    let Some(mesh) = meshes.get(&mesh3d.0) else {
        return;
    };

    // Bind even on failure so a bad mesh is reported once, not every frame
    state.entity = Some(entity);
    state.mesh = Some(mesh3d.0.clone());

    let Some((vertices, faces)) = extract_mesh_buffers(mesh) else {
        warn!("Deform target {:?} is not an indexable triangle mesh", entity);
        return;
    };

    rig.0.set_model_transform(model_transform(transform));
    match rig.0.load_mesh(vertices, &faces) {
        Ok(handle) => {
            state.synced_revision = rig.0.mesh().revision();
            info!(
                "Deform target {:?} bound: {} vertices, {} faces",
                entity, handle.vertex_count, handle.face_count
            );
        }
        Err(err) => warn!("Deform target {:?} rejected: {}", entity, err),
    }
}

fn sync_model_transform(
    targets: Query<&Transform, (With<DeformTarget>, Changed<Transform>)>,
    mut rig: ResMut<DeformRig>,
) {
    if let Ok(transform) = targets.single() {
        rig.0.set_model_transform(model_transform(transform));
    }
}

fn handle_mode_hotkeys(key_input: Res<ButtonInput<KeyCode>>, mut rig: ResMut<DeformRig>) {
    let mode = if key_input.just_pressed(KeyCode::Digit1) {
        Some(InteractionMode::View)
    } else if key_input.just_pressed(KeyCode::Digit2) {
        Some(InteractionMode::Select)
    } else if key_input.just_pressed(KeyCode::Digit3) {
        Some(InteractionMode::Deform)
    } else {
        None
    };

    if let Some(mode) = mode {
        // A refused mode change is queued for the UI by the rig
        if let Err(err) = rig.0.set_mode(mode) {
            warn!("Mode change to {:?} refused: {}", mode, err);
        }
    }

    if key_input.just_pressed(KeyCode::Escape) {
        rig.0.clear_selection();
        info!("Selection cleared");
    }
}

fn apply_ui_commands(mut commands: MessageReader<UiCommand>, mut rig: ResMut<DeformRig>) {
    for command in commands.read() {
        rig.0.handle_ui_message(command.0.clone());
    }
}

/// Turn left-button presses and cursor motion into rig pointer events
fn handle_pointer_input(
    mouse_button: Res<ButtonInput<MouseButton>>,
    key_input: Res<ButtonInput<KeyCode>>,
    windows: Query<(Entity, &Window), With<PrimaryWindow>>,
    mut cursor_events: MessageReader<CursorMoved>,
    camera_query: Query<(&Projection, &GlobalTransform), With<MainCamera>>,
    mut rig: ResMut<DeformRig>,
) {
    let Ok((window_entity, window)) = windows.single() else {
        cursor_events.clear();
        return;
    };
    let Ok((projection, camera_transform)) = camera_query.single() else {
        cursor_events.clear();
        return;
    };
    let Some(camera) = camera_pose(projection, camera_transform) else {
        cursor_events.clear();
        return;
    };

    let size = Vec2::new(window.width(), window.height());
    let cursor_positions: Vec<Vec2> = cursor_events
        .read()
        .filter(|e| e.window == window_entity)
        .map(|e| e.position)
        .collect();

    if mouse_button.just_pressed(MouseButton::Left) {
        let position = cursor_positions
            .last()
            .copied()
            .or_else(|| window.cursor_position());
        if let Some(position) = position {
            let ndc = cursor_to_ndc(position, size);
            let event = PointerEvent::down(ndc, read_modifiers(&key_input));
            let outcome = rig.0.handle_pointer(&event, &camera);
            debug!("Pointer down: {:?}", outcome);
        }
    }

    if rig.0.is_dragging() {
        for position in cursor_positions {
            rig.0
                .handle_pointer(&PointerEvent::moved(cursor_to_ndc(position, size)), &camera);
        }
    }

    if mouse_button.just_released(MouseButton::Left) {
        let position = window.cursor_position().unwrap_or(size * 0.5);
        let outcome = rig
            .0
            .handle_pointer(&PointerEvent::up(cursor_to_ndc(position, size)), &camera);
        debug!("Pointer up: {:?}", outcome);
    }
}

/// Per-frame solve for the latest drag target
fn run_deform_frame(mut rig: ResMut<DeformRig>) {
    if !rig.0.has_pending_frame() {
        return;
    }
    if let Ok(FrameOutcome::Solved(report)) = rig.0.run_frame() {
        debug!(
            "Deformed: vertex {} dragged, {} constraints",
            report.dragged, report.constraints
        );
    }
}

fn write_back_mesh(
    rig: Res<DeformRig>,
    mut state: ResMut<DeformTargetState>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let store = rig.0.mesh();
    if !store.is_loaded() || store.revision() == state.synced_revision {
        return;
    }
    let Some(handle) = state.mesh.clone() else {
        return;
    };
    let Some(mut mesh) = meshes.get_mut(&handle) else {
        return;
    };

    write_mesh_buffers(&mut mesh, store);
    state.synced_revision = store.revision();
}

fn forward_rig_messages(mut rig: ResMut<DeformRig>, mut outbound: ResMut<OutboundUiMessages>) {
    for message in rig.0.drain_messages() {
        outbound.send(message);
    }
}

/// Flat positions and triangle indices of a triangle-list mesh
pub fn extract_mesh_buffers(mesh: &Mesh) -> Option<(Vec<f32>, Vec<u32>)> {
    if mesh.primitive_topology() != PrimitiveTopology::TriangleList {
        return None;
    }

    let positions = match mesh.attribute(Mesh::ATTRIBUTE_POSITION) {
        Some(VertexAttributeValues::Float32x3(v)) => v,
        _ => return None,
    };

    let indices: Vec<u32> = match mesh.indices() {
        Some(Indices::U32(i)) => i.clone(),
        Some(Indices::U16(i)) => i.iter().map(|&x| x as u32).collect(),
        // Non-indexed: every three positions form a triangle
        None => (0..positions.len() as u32).collect(),
    };

    let flat: &[f32] = bytemuck::cast_slice(positions);
    Some((flat.to_vec(), indices))
}

/// Copy the store's local vertices and normals into a mesh asset
pub fn write_mesh_buffers(mesh: &mut Mesh, store: &MeshStore) {
    let positions: Vec<[f32; 3]> = bytemuck::cast_slice(store.local_vertices()).to_vec();
    let normals: Vec<[f32; 3]> = store.normals().iter().map(|n| n.to_array()).collect();
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
}

/// Window cursor position (origin top-left, +Y down) to NDC (+Y up)
pub fn cursor_to_ndc(position: Vec2, size: Vec2) -> glam::Vec2 {
    glam::Vec2::new(
        position.x / size.x * 2.0 - 1.0,
        1.0 - position.y / size.y * 2.0,
    )
}

fn read_modifiers(key_input: &ButtonInput<KeyCode>) -> Modifiers {
    Modifiers {
        shift: key_input.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]),
        ctrl: key_input.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]),
        alt: key_input.any_pressed([KeyCode::AltLeft, KeyCode::AltRight]),
    }
}

/// Model transform of the target entity. Scale is taken from the X axis.
fn model_transform(transform: &Transform) -> ModelTransform {
    ModelTransform::new(
        glam::Vec3::from_array(transform.translation.to_array()),
        glam::Quat::from_array(transform.rotation.to_array()),
        transform.scale.x,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::asset::RenderAssetUsages;

    fn triangle_mesh() -> Mesh {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(
            Mesh::ATTRIBUTE_POSITION,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        );
        mesh.insert_indices(Indices::U16(vec![0, 1, 2]));
        mesh
    }

    #[test]
    fn test_extract_mesh_buffers() {
        let (vertices, faces) = extract_mesh_buffers(&triangle_mesh()).unwrap();
        assert_eq!(vertices, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(faces, vec![0, 1, 2]);
    }

    #[test]
    fn test_extract_rejects_line_meshes() {
        let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(extract_mesh_buffers(&mesh).is_none());
    }

    #[test]
    fn test_write_back_replaces_positions_and_normals() {
        let mut mesh = triangle_mesh();
        let mut store = MeshStore::new();
        store
            .load(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[0, 1, 2])
            .unwrap();
        store
            .apply_solved_vertices(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0])
            .unwrap();

        write_mesh_buffers(&mut mesh, &store);

        let Some(VertexAttributeValues::Float32x3(positions)) =
            mesh.attribute(Mesh::ATTRIBUTE_POSITION)
        else {
            panic!("positions missing");
        };
        assert_eq!(positions[1], [2.0, 0.0, 0.0]);
        let Some(VertexAttributeValues::Float32x3(normals)) = mesh.attribute(Mesh::ATTRIBUTE_NORMAL)
        else {
            panic!("normals missing");
        };
        assert_eq!(normals.len(), 3);
        assert!((normals[0][2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cursor_to_ndc() {
        let size = Vec2::new(800.0, 600.0);
        assert_eq!(cursor_to_ndc(Vec2::new(400.0, 300.0), size), glam::Vec2::ZERO);
        assert_eq!(cursor_to_ndc(Vec2::ZERO, size), glam::Vec2::new(-1.0, 1.0));
        assert_eq!(cursor_to_ndc(size, size), glam::Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_model_transform_from_bevy() {
        let transform = Transform::from_xyz(1.0, 2.0, 3.0).with_scale(Vec3::splat(2.0));
        let model = model_transform(&transform);
        assert_eq!(model.translation, glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(model.scale, 2.0);
    }
}
