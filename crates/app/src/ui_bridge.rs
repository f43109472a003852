//! Stand-in UI shell: scene messages are logged as JSON
//!
//! A real shell would ship these over its transport; the encoding is the same.

use bevy::prelude::*;
use marionette_ipc::SceneToUi;
use marionette_scene::OutboundUiMessages;
use tracing::{debug, error, warn};

pub struct UiBridgePlugin;

impl Plugin for UiBridgePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Last, forward_outbound_messages);
    }
}

fn forward_outbound_messages(mut outbound: ResMut<OutboundUiMessages>) {
    for message in outbound.drain() {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(err) => {
                error!("Failed to encode UI message: {}", err);
                continue;
            }
        };

        match message {
            SceneToUi::Error { .. } => warn!("ui <- {}", json),
            _ => debug!("ui <- {}", json),
        }
    }
}
