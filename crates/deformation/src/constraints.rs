//! Handle and anchor bookkeeping.
//!
//! A single map keyed by vertex index holds both roles, so a vertex can never
//! be a handle and an anchor at the same time. Target positions are stored in
//! world space.

use std::collections::BTreeMap;

use glam::Vec3;
use marionette_ipc::ConstraintSummary;
use tracing::{debug, warn};

use crate::types::{Constraint, ConstraintRole, VertexIndex};

/// Result of [`ConstraintSet::toggle_anchor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorToggle {
    /// The vertex became an anchor
    Added,
    /// The vertex was an anchor and is now free
    Removed,
    /// The vertex is a handle; handles take precedence and nothing changed
    RejectedHandle,
}

/// Constrained vertices and their world-space targets, ordered by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    entries: BTreeMap<VertexIndex, Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `index` a handle at `position`, replacing any anchor entry.
    pub fn select_handle(&mut self, index: VertexIndex, position: Vec3) {
        let previous = self.entries.insert(
            index,
            Constraint {
                role: ConstraintRole::Handle,
                position,
            },
        );
        if let Some(Constraint {
            role: ConstraintRole::Anchor,
            ..
        }) = previous
        {
            debug!("Vertex {} promoted from anchor to handle", index);
        }
    }

    /// Toggle `index` as an anchor. Handles are left untouched.
    pub fn toggle_anchor(&mut self, index: VertexIndex, position: Vec3) -> AnchorToggle {
        match self.entries.get(&index).map(|c| c.role) {
            Some(ConstraintRole::Anchor) => {
                self.entries.remove(&index);
                AnchorToggle::Removed
            }
            Some(ConstraintRole::Handle) => {
                warn!("Vertex {} is a handle and cannot also be an anchor", index);
                AnchorToggle::RejectedHandle
            }
            None => {
                self.entries.insert(
                    index,
                    Constraint {
                        role: ConstraintRole::Anchor,
                        position,
                    },
                );
                AnchorToggle::Added
            }
        }
    }

    /// Drop every handle and anchor.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Read-only view of every constraint, ordered by vertex index.
    pub fn snapshot(&self) -> &BTreeMap<VertexIndex, Constraint> {
        &self.entries
    }

    pub fn get(&self, index: VertexIndex) -> Option<&Constraint> {
        self.entries.get(&index)
    }

    pub fn role_of(&self, index: VertexIndex) -> Option<ConstraintRole> {
        self.entries.get(&index).map(|c| c.role)
    }

    pub fn is_handle(&self, index: VertexIndex) -> bool {
        self.role_of(index) == Some(ConstraintRole::Handle)
    }

    /// Handles with their stored positions, ordered by index.
    pub fn handles(&self) -> impl Iterator<Item = (VertexIndex, Vec3)> + '_ {
        self.with_role(ConstraintRole::Handle)
    }

    /// Anchors with their stored positions, ordered by index.
    pub fn anchors(&self) -> impl Iterator<Item = (VertexIndex, Vec3)> + '_ {
        self.with_role(ConstraintRole::Anchor)
    }

    fn with_role(&self, role: ConstraintRole) -> impl Iterator<Item = (VertexIndex, Vec3)> + '_ {
        self.entries
            .iter()
            .filter(move |(_, c)| c.role == role)
            .map(|(&i, c)| (i, c.position))
    }

    /// Overwrite the stored position of an existing entry without touching its
    /// role. Returns false if `index` is unconstrained.
    pub fn update_position(&mut self, index: VertexIndex, position: Vec3) -> bool {
        match self.entries.get_mut(&index) {
            Some(constraint) => {
                constraint.position = position;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted index lists for the UI.
    pub fn summary(&self) -> ConstraintSummary {
        ConstraintSummary {
            handles: self.handles().map(|(i, _)| i).collect(),
            anchors: self.anchors().map(|(i, _)| i).collect(),
        }
    }
}
