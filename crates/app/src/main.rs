//! Marionette - interactive handle-based mesh deformation

use bevy::prelude::*;
use bevy::window::WindowResolution;
use marionette_config::{DeformConfig, DisplayConfig};
use marionette_scene::ScenePlugin;

mod ui_bridge;

fn main() {
    // Environment overrides for the solver budget and marker size
    let deform_config = DeformConfig::from_env();
    let display_config = DisplayConfig::default();

    info!(
        "Starting Marionette ({} solver iterations per frame)",
        deform_config.solver_iterations
    );

    let window_config = Window {
        title: "Marionette".into(),
        resolution: WindowResolution::new(display_config.width, display_config.height),
        present_mode: bevy::window::PresentMode::AutoVsync,
        ..default()
    };

    let mut app = App::new();

    app.insert_resource(deform_config)
        .insert_resource(display_config);

    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(window_config),
                ..default()
            })
            .set(bevy::log::LogPlugin {
                level: bevy::log::Level::INFO,
                ..default()
            }),
    );

    app.add_plugins(ScenePlugin)
        .add_plugins(ui_bridge::UiBridgePlugin)
        .run();
}
