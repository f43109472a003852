//! Handle and anchor marker gizmos
//!
//! Markers are drawn at each constraint's stored world target with the same
//! radius deform mode uses for picking them.

use bevy::prelude::*;
use deformation::ConstraintRole;
use marionette_config::DeformConfig;
use marionette_ipc::InteractionMode;

use crate::deform::DeformRig;

const HANDLE_COLOR: Color = Color::srgb(1.0, 0.55, 0.1);
const DRAGGED_COLOR: Color = Color::srgb(1.0, 0.9, 0.3);
const ANCHOR_COLOR: Color = Color::srgb(0.2, 0.5, 1.0);

pub struct MarkerPlugin;

impl Plugin for MarkerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PostUpdate, draw_constraint_markers);
    }
}

fn draw_constraint_markers(rig: Res<DeformRig>, config: Res<DeformConfig>, mut gizmos: Gizmos) {
    if rig.0.mode() == InteractionMode::View {
        return;
    }

    let dragged = rig.0.dragged_handle();
    for (&index, constraint) in rig.0.constraints().snapshot() {
        let color = match constraint.role {
            ConstraintRole::Handle if dragged == Some(index) => DRAGGED_COLOR,
            ConstraintRole::Handle => HANDLE_COLOR,
            ConstraintRole::Anchor => ANCHOR_COLOR,
        };
        let center = Vec3::from_array(constraint.position.to_array());
        gizmos.sphere(
            Isometry3d::from_translation(center),
            config.marker_pick_radius,
            color,
        );
    }
}
