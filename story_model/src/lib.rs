//! # Story Model
//!
//! The data crate for Storyloom - story structure, entity identities, world state,
//! and engine configuration. This crate holds no derivation logic; it is the shared
//! vocabulary the `narrative_state` engine reads on every pass.

pub mod calendar;
pub mod config;
pub mod entities;
pub mod story;
pub mod structure;
pub mod world_state;

pub use calendar::*;
pub use config::*;
pub use entities::*;
pub use story::*;
pub use structure::*;
pub use world_state::*;
