//! IPC message protocol for Marionette
//!
//! Defines the message types exchanged between the deformation scene, the UI
//! shell, and the external solver engine.

pub mod commands;
pub mod error;
pub mod input;
pub mod messages;
pub mod solver;

pub use commands::*;
pub use error::IpcError;
pub use input::*;
pub use messages::*;
pub use solver::*;
