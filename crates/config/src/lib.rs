//! Shared configuration for Marionette
//!
//! This crate provides the single source of truth for window dimensions and
//! the tunables of the deformation pipeline (solver iteration budget, marker
//! picking radius, modifier bindings).

use marionette_ipc::ModifierKey;
use serde::{Deserialize, Serialize};

#[cfg(feature = "bevy")]
use bevy::prelude::Resource;

/// Default window width in pixels
pub const DEFAULT_WIDTH: u32 = 1920;

/// Default window height in pixels
pub const DEFAULT_HEIGHT: u32 = 1080;

/// Solver iterations requested per frame
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 50;

/// Radius of the pickable sphere around a handle marker, in world units
pub const DEFAULT_MARKER_RADIUS: f32 = 0.06;

/// Environment override for [`DeformConfig::solver_iterations`]
pub const ENV_SOLVER_ITERATIONS: &str = "MARIONETTE_SOLVER_ITERATIONS";

/// Environment override for [`DeformConfig::marker_pick_radius`]
pub const ENV_MARKER_RADIUS: &str = "MARIONETTE_MARKER_RADIUS";

/// Display configuration for window and rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "bevy", derive(Resource))]
pub struct DisplayConfig {
    /// Window width in logical pixels
    pub width: u32,
    /// Window height in logical pixels
    pub height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Which modifier selects a handle and which toggles an anchor in select mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierBindings {
    pub handle: ModifierKey,
    pub anchor: ModifierKey,
}

impl Default for ModifierBindings {
    fn default() -> Self {
        Self {
            handle: ModifierKey::Shift,
            anchor: ModifierKey::Ctrl,
        }
    }
}

/// Tunables for the interaction and scheduling pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "bevy", derive(Resource))]
pub struct DeformConfig {
    /// Fixed iteration budget per solve (not run to convergence)
    pub solver_iterations: u32,
    /// Pick radius around handle markers in deform mode
    pub marker_pick_radius: f32,
    /// Modifier keys for select mode
    pub bindings: ModifierBindings,
}

impl Default for DeformConfig {
    fn default() -> Self {
        Self {
            solver_iterations: DEFAULT_SOLVER_ITERATIONS,
            marker_pick_radius: DEFAULT_MARKER_RADIUS,
            bindings: ModifierBindings::default(),
        }
    }
}

impl DeformConfig {
    /// Defaults overridden by `MARIONETTE_SOLVER_ITERATIONS` and
    /// `MARIONETTE_MARKER_RADIUS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable or non-positive values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(iterations) = lookup(ENV_SOLVER_ITERATIONS)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|&v| v > 0)
        {
            config.solver_iterations = iterations;
        }

        if let Some(radius) = lookup(ENV_MARKER_RADIUS)
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
        {
            config.marker_pick_radius = radius;
        }

        config
    }
}
