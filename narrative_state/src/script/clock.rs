//! Story clock: keeps `currentTime` in step with node transitions during a replay.

use story_model::{Message, NodeId, TimeFormatter, WorldState};

use crate::story_order::StoryIndex;

/// Tracks the node being replayed and the last explicit chapter time.
///
/// Entering a node with `storyTime` sets the time and remembers it as the base.
/// Entering a node without one resets the time to the remembered base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryClock {
    current_node: Option<NodeId>,
    base_time: i64,
}

impl StoryClock {
    pub fn new(base_time: i64) -> Self {
        Self {
            current_node: None,
            base_time,
        }
    }

    pub fn base_time(&self) -> i64 {
        self.base_time
    }

    pub fn current_node(&self) -> Option<&NodeId> {
        self.current_node.as_ref()
    }

    /// Apply the time rule if `message` starts a new node. Returns whether it did.
    ///
    /// Messages without a node never count as a transition.
    pub fn enter(
        &mut self,
        message: &Message,
        index: &StoryIndex<'_>,
        state: &mut WorldState,
        formatter: &dyn TimeFormatter,
    ) -> bool {
        let Some(node_id) = message.node_id.as_ref() else {
            return false;
        };
        if self.current_node.as_ref() == Some(node_id) {
            return false;
        }

        self.current_node = Some(node_id.clone());
        match index.get(node_id.as_str()).and_then(|node| node.story_time) {
            Some(story_time) => {
                self.base_time = story_time;
                state.set_story_time(story_time, formatter);
            }
            None => state.set_story_time(self.base_time, formatter),
        }
        true
    }
}
