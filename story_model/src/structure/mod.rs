//! The story hierarchy: nodes, the messages they own, and branch points.

mod branch;
mod message;
mod node;

pub use branch::*;
pub use message::*;
pub use node::*;
