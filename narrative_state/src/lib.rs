//! # Narrative State
//!
//! The derivation engine behind Storyloom. Given the story tree from `story_model`,
//! it answers "what does the world look like at this message?".
//!
//! ## Core Components
//!
//! - **story_order**: Deterministic linearization of nodes and messages
//! - **branch_path**: Follows branch choices into the active path, with loop protection
//! - **script**: Replays user scripts against an evolving world state
//! - **cache**: Memoized per-message snapshots with explicit invalidation
//!
//! ## Execution Model
//!
//! - **Synchronous**: Every pass runs to completion on the calling thread
//! - **Read-triggered**: Nothing recomputes until a dirty cache is read
//! - **Pluggable scripting**: Evaluators sit behind [`script::ScriptCompiler`]

pub mod branch_path;
pub mod cache;
pub mod error;
pub mod script;
pub mod story_order;

pub use branch_path::*;
pub use cache::*;
pub use error::*;
pub use script::*;
pub use story_order::*;
