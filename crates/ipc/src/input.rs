//! Pointer modifier state and the logical modifier keys bound to actions.

use serde::{Deserialize, Serialize};

/// Keyboard modifier keys state at the time of a pointer event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    /// No modifier held.
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
    };

    /// Whether the given logical key is held.
    pub fn is_held(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
        }
    }

    /// Whether any modifier is held.
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt
    }
}

/// A single modifier key that can be bound to an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Alt,
}

impl ModifierKey {
    /// Modifier state with only this key held.
    pub fn held(self) -> Modifiers {
        let mut modifiers = Modifiers::NONE;
        match self {
            Self::Shift => modifiers.shift = true,
            Self::Ctrl => modifiers.ctrl = true,
            Self::Alt => modifiers.alt = true,
        }
        modifiers
    }
}
