//! The result of a branch walk.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use story_model::{MessageId, NodeId, OptionId};

/// Why a branch walk stopped.
///
/// None of these are errors: every variant comes with a usable (possibly partial)
/// active path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathEnd {
    /// The walk ran off the end of the story.
    #[default]
    StoryEnd,
    /// A branch with no recorded choice.
    Unresolved { branch_id: MessageId },
    /// The recorded choice names an option the branch does not offer.
    UnknownOption {
        branch_id: MessageId,
        option_id: OptionId,
    },
    /// The chosen option points at a node or message that does not exist.
    MissingTarget {
        branch_id: MessageId,
        option_id: OptionId,
    },
    /// A branch was reached twice; the path holds what was accumulated before.
    LoopDetected { branch_id: MessageId },
}

/// Nodes and messages reachable from the story start under a set of choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePath {
    pub message_ids: HashSet<MessageId>,
    pub node_ids: HashSet<NodeId>,
    pub end: PathEnd,
}

impl ActivePath {
    /// Create an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_message(&self, id: &str) -> bool {
        self.message_ids.contains(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_ids.contains(id)
    }

    /// Whether the walk reached the end of the story.
    pub fn is_complete(&self) -> bool {
        self.end == PathEnd::StoryEnd
    }

    pub fn hit_loop(&self) -> bool {
        matches!(self.end, PathEnd::LoopDetected { .. })
    }

    pub fn message_count(&self) -> usize {
        self.message_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_complete() {
        let path = ActivePath::new();
        assert!(path.is_complete());
        assert!(!path.hit_loop());
        assert_eq!(path.message_count(), 0);
    }

    #[test]
    fn test_contains_by_str() {
        let mut path = ActivePath::new();
        path.message_ids.insert(MessageId::from("m1"));
        path.node_ids.insert(NodeId::from("c1"));
        path.end = PathEnd::LoopDetected {
            branch_id: MessageId::from("b"),
        };

        assert!(path.contains_message("m1"));
        assert!(path.contains_node("c1"));
        assert!(!path.contains_node("c2"));
        assert!(path.hit_loop());
        assert!(!path.is_complete());
    }
}
