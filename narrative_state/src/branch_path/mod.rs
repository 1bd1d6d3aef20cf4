//! Branch Path Calculator - follows branch choices from the story start.
//!
//! The walk position is a (node, message) pair over the story order. Leaf nodes
//! are entered in order; a branch message with options either jumps to the chosen
//! target or ends the walk. A branch reached twice ends the walk as a loop.

mod path;

pub use path::*;

use std::collections::{HashMap, HashSet};

use story_model::{BranchChoices, BranchConfig, BranchOption, Message, Node};
use tracing::{debug, warn};

use crate::story_order::{group_by_node, StoryIndex};

/// Calculates active paths under a configured loop budget.
#[derive(Debug, Clone, Default)]
pub struct BranchWalker {
    config: BranchConfig,
}

impl BranchWalker {
    pub fn new(config: BranchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BranchConfig {
        &self.config
    }

    /// Nodes and messages reachable under `choices`.
    pub fn active_path(
        &self,
        messages: &[Message],
        nodes: &[Node],
        choices: &BranchChoices,
    ) -> ActivePath {
        let mut path = ActivePath::new();
        if messages.is_empty() || nodes.is_empty() {
            return path;
        }

        let walk = StoryWalk::new(messages, nodes);
        let mut visited_branches: HashSet<&str> = HashSet::new();
        let mut cursor = Cursor::default();

        while let Some(node) = walk.order.get(cursor.node).copied() {
            let node_messages = walk.messages_at(cursor.node);
            if !node.is_leaf() || node_messages.is_empty() {
                cursor.next_node();
                continue;
            }

            path.node_ids.insert(node.id.clone());
            let mut jumped = false;

            while let Some(message) = node_messages.get(cursor.message).copied() {
                path.message_ids.insert(message.id.clone());

                if message.is_branch_point() {
                    if !visited_branches.insert(message.id.as_str()) {
                        warn!(branch_id = %message.id, "Branch loop detected, returning partial path");
                        path.end = PathEnd::LoopDetected {
                            branch_id: message.id.clone(),
                        };
                        return path;
                    }

                    match walk.resolve(message, choices) {
                        Step::Jump(target) => {
                            cursor = target;
                            jumped = true;
                            break;
                        }
                        Step::Stop(end) => {
                            debug!(branch_id = %message.id, end = ?end, "Active path ends at branch");
                            path.end = end;
                            return path;
                        }
                    }
                }

                cursor.message += 1;
            }

            if !jumped {
                cursor.next_node();
            }
        }

        debug!(
            messages = path.message_ids.len(),
            nodes = path.node_ids.len(),
            "Active path reached story end"
        );
        path
    }

    /// The active path if `option_id` were chosen at `branch_id`. `choices` is untouched.
    pub fn preview_choice(
        &self,
        messages: &[Message],
        nodes: &[Node],
        choices: &BranchChoices,
        branch_id: &str,
        option_id: &str,
    ) -> ActivePath {
        self.active_path(messages, nodes, &choices.with_choice(branch_id, option_id))
    }

    /// Whether following `choices` (plus an optional hypothetical choice) revisits a message.
    ///
    /// A walk that revisits nothing visits at most `messages.len()` messages, so a
    /// revisit is always caught first for `loop_budget_factor >= 1`. The budget of
    /// `loop_budget_factor × messages.len()` visits only cuts a walk short below that.
    pub fn has_loop(
        &self,
        messages: &[Message],
        nodes: &[Node],
        choices: &BranchChoices,
        new_choice: Option<(&str, &str)>,
    ) -> bool {
        if messages.is_empty() || nodes.is_empty() {
            return false;
        }

        let overlay;
        let choices = match new_choice {
            Some((branch_id, option_id)) => {
                overlay = choices.with_choice(branch_id, option_id);
                &overlay
            }
            None => choices,
        };

        let walk = StoryWalk::new(messages, nodes);
        let budget = self.config.budget(messages.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut visits = 0usize;
        let mut cursor = Cursor::default();

        while let Some(node) = walk.order.get(cursor.node).copied() {
            let node_messages = walk.messages_at(cursor.node);
            if !node.is_leaf() || node_messages.is_empty() {
                cursor.next_node();
                continue;
            }

            let mut jumped = false;
            while let Some(message) = node_messages.get(cursor.message).copied() {
                if !visited.insert(message.id.as_str()) {
                    debug!(message_id = %message.id, "Loop check revisited a message");
                    return true;
                }
                visits += 1;
                if visits > budget {
                    warn!(budget, "Loop check exhausted its iteration budget");
                    return true;
                }

                if message.is_branch_point() {
                    match walk.resolve(message, choices) {
                        Step::Jump(target) => {
                            cursor = target;
                            jumped = true;
                            break;
                        }
                        Step::Stop(_) => return false,
                    }
                }

                cursor.message += 1;
            }

            if !jumped {
                cursor.next_node();
            }
        }

        false
    }

    /// The message that follows `current` on the active path.
    ///
    /// A resolved branch continues at its target; otherwise the next sibling, then
    /// the first message of the next non-empty chapter. `None` at the story end, at
    /// an unresolved branch, or when `current` is unknown or has no node.
    pub fn next_message<'a>(
        &self,
        current: &str,
        messages: &'a [Message],
        nodes: &[Node],
        choices: &BranchChoices,
    ) -> Option<&'a Message> {
        let message = messages.iter().find(|m| m.id.as_str() == current)?;
        let node_id = message.node_id.as_ref()?;

        if message.is_branch_point() {
            let option = choices
                .get(message.id.as_str())
                .and_then(|choice| message.option(choice.as_str()))?;
            return messages
                .iter()
                .find(|m| m.id == option.target_message_id);
        }

        let walk = StoryWalk::new(messages, nodes);
        let siblings = walk.groups.get(node_id.as_str())?;
        if let Some(position) = siblings.iter().position(|m| m.id.as_str() == current) {
            if let Some(next) = siblings.get(position + 1) {
                return Some(*next);
            }
        }

        let start = walk.position_of.get(node_id.as_str())? + 1;
        (start..walk.order.len())
            .filter(|&index| walk.order[index].is_leaf())
            .find_map(|index| walk.messages_at(index).first().copied())
    }
}

/// [`BranchWalker::active_path`] with the default loop budget.
pub fn calculate_active_path(
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
) -> ActivePath {
    BranchWalker::default().active_path(messages, nodes, choices)
}

/// [`BranchWalker::preview_choice`] with the default loop budget.
pub fn preview_choice(
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
    branch_id: &str,
    option_id: &str,
) -> ActivePath {
    BranchWalker::default().preview_choice(messages, nodes, choices, branch_id, option_id)
}

/// [`BranchWalker::has_loop`] with the default loop budget.
pub fn has_loop(
    messages: &[Message],
    nodes: &[Node],
    choices: &BranchChoices,
    new_choice: Option<(&str, &str)>,
) -> bool {
    BranchWalker::default().has_loop(messages, nodes, choices, new_choice)
}

/// [`BranchWalker::next_message`] with the default loop budget.
pub fn next_message_in_path<'a>(
    current: &str,
    messages: &'a [Message],
    nodes: &[Node],
    choices: &BranchChoices,
) -> Option<&'a Message> {
    BranchWalker::default().next_message(current, messages, nodes, choices)
}

/// An option that jumps to the first message of `target_node`.
///
/// `None` when the node has no messages.
pub fn option_to_node(
    label: impl Into<String>,
    target_node: &str,
    messages: &[Message],
) -> Option<BranchOption> {
    let groups = group_by_node(messages);
    let Some(first) = groups.get(target_node).and_then(|group| group.first()) else {
        warn!(node_id = target_node, "Cannot target a node without messages");
        return None;
    };
    Some(BranchOption::new(label, target_node, first.id.clone()))
}

/// An option that jumps to `target_message` inside the current chapter.
pub fn option_in_chapter(
    label: impl Into<String>,
    target_message: &str,
    current_node: &str,
) -> BranchOption {
    BranchOption::new(label, current_node, target_message)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    node: usize,
    message: usize,
}

impl Cursor {
    fn next_node(&mut self) {
        self.node += 1;
        self.message = 0;
    }
}

enum Step {
    Jump(Cursor),
    Stop(PathEnd),
}

/// Story order and per-node message groups for one walk.
struct StoryWalk<'n, 'm> {
    order: Vec<&'n Node>,
    position_of: HashMap<&'n str, usize>,
    groups: HashMap<&'m str, Vec<&'m Message>>,
}

impl<'n, 'm> StoryWalk<'n, 'm> {
    fn new(messages: &'m [Message], nodes: &'n [Node]) -> Self {
        let order = StoryIndex::new(nodes).ordered();
        let mut position_of = HashMap::with_capacity(order.len());
        for (position, node) in order.iter().enumerate() {
            position_of.entry(node.id.as_str()).or_insert(position);
        }

        Self {
            order,
            position_of,
            groups: group_by_node(messages),
        }
    }

    fn messages_at(&self, position: usize) -> &[&'m Message] {
        self.order
            .get(position)
            .and_then(|node| self.groups.get(node.id.as_str()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn resolve(&self, branch: &Message, choices: &BranchChoices) -> Step {
        let Some(option_id) = choices.get(branch.id.as_str()) else {
            return Step::Stop(PathEnd::Unresolved {
                branch_id: branch.id.clone(),
            });
        };

        let Some(option) = branch.option(option_id.as_str()) else {
            warn!(branch_id = %branch.id, option_id = %option_id, "Chosen option is not offered by branch");
            return Step::Stop(PathEnd::UnknownOption {
                branch_id: branch.id.clone(),
                option_id: option_id.clone(),
            });
        };

        let target = self
            .position_of
            .get(option.target_node_id.as_str())
            .and_then(|&node| {
                self.messages_at(node)
                    .iter()
                    .position(|m| m.id == option.target_message_id)
                    .map(|message| Cursor { node, message })
            });

        match target {
            Some(cursor) => Step::Jump(cursor),
            None => {
                warn!(
                    branch_id = %branch.id,
                    option_id = %option.id,
                    target_node_id = %option.target_node_id,
                    target_message_id = %option.target_message_id,
                    "Branch target not found"
                );
                Step::Stop(PathEnd::MissingTarget {
                    branch_id: branch.id.clone(),
                    option_id: option.id.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_model::{MessageId, NodeId};

    fn tree() -> Vec<Node> {
        vec![
            Node::book("b1", 0.0),
            Node::arc("a1", 0.0).with_parent("b1"),
            Node::chapter("n1", 0.0).with_parent("a1"),
            Node::chapter("n2", 1.0).with_parent("a1"),
            Node::chapter("n3", 2.0).with_parent("a1"),
        ]
    }

    fn go(id: &str, node: &str, message: &str) -> BranchOption {
        BranchOption::with_id(id, id.to_uppercase(), node, message)
    }

    /// n1: m1, B, m2 | n2: m4, m5 | n3: m6
    fn forked() -> Vec<Message> {
        vec![
            Message::new("m1", "n1", 0.0),
            Message::branch("B", "n1", 1.0, vec![go("a", "n2", "m5"), go("z", "n3", "m6")]),
            Message::new("m2", "n1", 2.0),
            Message::new("m4", "n2", 0.0),
            Message::new("m5", "n2", 1.0),
            Message::new("m6", "n3", 0.0),
        ]
    }

    fn sorted(ids: &HashSet<MessageId>) -> Vec<&str> {
        let mut ids: Vec<&str> = ids.iter().map(MessageId::as_str).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_without_branches_every_leaf_message_is_active() {
        let nodes = tree();
        let messages = vec![
            Message::new("m1", "n1", 0.0),
            Message::new("m2", "n2", 0.0),
            Message::new("m3", "n3", 0.0),
            Message::new("stray", "b1", 0.0),
        ];

        let path = calculate_active_path(&messages, &nodes, &BranchChoices::new());

        assert_eq!(sorted(&path.message_ids), vec!["m1", "m2", "m3"]);
        assert_eq!(path.node_ids.len(), 3);
        assert!(!path.contains_node("b1"));
        assert!(path.is_complete());
    }

    #[test]
    fn test_jump_skips_rest_of_branch_node() {
        let nodes = tree();
        let messages = forked();
        let choices: BranchChoices = [("B", "a")].into_iter().collect();

        let path = calculate_active_path(&messages, &nodes, &choices);

        assert!(path.contains_message("m5"));
        assert!(path.contains_node("n2"));
        assert!(!path.contains_message("m2"));
        assert!(!path.contains_message("m4"));
        assert!(path.contains_message("m6"));
        assert!(path.is_complete());
    }

    #[test]
    fn test_jump_target_beyond_source_node_length() {
        // n1 holds only the branch, the target sits at index 2 of n2.
        let nodes = tree();
        let messages = vec![
            Message::branch("B", "n1", 0.0, vec![go("a", "n2", "m6")]),
            Message::new("m4", "n2", 0.0),
            Message::new("m5", "n2", 1.0),
            Message::new("m6", "n2", 2.0),
        ];
        let choices: BranchChoices = [("B", "a")].into_iter().collect();

        let path = calculate_active_path(&messages, &nodes, &choices);
        assert_eq!(sorted(&path.message_ids), vec!["B", "m6"]);
        assert!(path.contains_node("n2"));
    }

    #[test]
    fn test_unresolved_branch_terminates() {
        let nodes = tree();
        let messages = forked();

        let path = calculate_active_path(&messages, &nodes, &BranchChoices::new());

        assert_eq!(sorted(&path.message_ids), vec!["B", "m1"]);
        assert_eq!(
            path.end,
            PathEnd::Unresolved {
                branch_id: MessageId::from("B")
            }
        );
    }

    #[test]
    fn test_unknown_option_terminates() {
        let nodes = tree();
        let messages = forked();
        let choices: BranchChoices = [("B", "gone")].into_iter().collect();

        let path = calculate_active_path(&messages, &nodes, &choices);
        assert!(matches!(path.end, PathEnd::UnknownOption { .. }));
        assert_eq!(path.message_count(), 2);
    }

    #[test]
    fn test_missing_target_terminates() {
        let nodes = tree();
        let messages = vec![
            Message::new("m1", "n1", 0.0),
            Message::branch("B", "n1", 1.0, vec![go("a", "n2", "nowhere"), go("b", "void", "m1")]),
            Message::new("m4", "n2", 0.0),
        ];

        let choices: BranchChoices = [("B", "a")].into_iter().collect();
        let path = calculate_active_path(&messages, &nodes, &choices);
        assert!(matches!(path.end, PathEnd::MissingTarget { .. }));
        assert!(!path.contains_message("m4"));

        let choices: BranchChoices = [("B", "b")].into_iter().collect();
        let path = calculate_active_path(&messages, &nodes, &choices);
        assert!(matches!(path.end, PathEnd::MissingTarget { .. }));
    }

    #[test]
    fn test_empty_option_list_walks_as_normal() {
        let nodes = tree();
        let messages = vec![
            Message::branch("B", "n1", 0.0, Vec::new()),
            Message::new("m2", "n1", 1.0),
        ];

        let path = calculate_active_path(&messages, &nodes, &BranchChoices::new());
        assert_eq!(sorted(&path.message_ids), vec!["B", "m2"]);
        assert!(path.is_complete());
    }

    #[test]
    fn test_cycle_terminates_with_smaller_set() {
        let nodes = tree();
        let cyclic = vec![
            Message::new("m1", "n1", 0.0),
            Message::branch("B", "n1", 1.0, vec![go("back", "n1", "m1"), go("on", "n2", "m4")]),
            Message::new("m4", "n2", 0.0),
            Message::new("m6", "n3", 0.0),
        ];

        let looping: BranchChoices = [("B", "back")].into_iter().collect();
        let acyclic: BranchChoices = [("B", "on")].into_iter().collect();

        let partial = calculate_active_path(&cyclic, &nodes, &looping);
        let full = calculate_active_path(&cyclic, &nodes, &acyclic);

        assert!(partial.hit_loop());
        assert!(full.is_complete());
        assert!(partial.message_count() < full.message_count());
        assert!(partial.message_ids.is_subset(&full.message_ids));
    }

    #[test]
    fn test_preview_does_not_touch_choices() {
        let nodes = tree();
        let messages = forked();
        let choices = BranchChoices::new();

        let preview = preview_choice(&messages, &nodes, &choices, "B", "z");

        assert!(choices.is_empty());
        assert!(preview.contains_message("m6"));
        assert!(!preview.contains_node("n2"));
    }

    #[test]
    fn test_has_loop() {
        let nodes = tree();
        let messages = vec![
            Message::new("m1", "n1", 0.0),
            Message::branch("B", "n1", 1.0, vec![go("back", "n1", "m1"), go("on", "n2", "m4")]),
            Message::new("m4", "n2", 0.0),
        ];
        let choices = BranchChoices::new();

        assert!(!has_loop(&messages, &nodes, &choices, None));
        assert!(!has_loop(&messages, &nodes, &choices, Some(("B", "on"))));
        assert!(has_loop(&messages, &nodes, &choices, Some(("B", "back"))));
        assert!(choices.is_empty());
    }

    #[test]
    fn test_has_loop_ignores_deep_hierarchy() {
        let nodes = vec![
            Node::book("b1", 0.0),
            Node::arc("a1", 0.0).with_parent("b1"),
            Node::arc("a2", 1.0).with_parent("b1"),
            Node::arc("a3", 2.0).with_parent("b1"),
            Node::chapter("n1", 0.0).with_parent("a3"),
        ];
        let messages = vec![Message::new("m1", "n1", 0.0)];

        assert!(!has_loop(&messages, &nodes, &BranchChoices::new(), None));
    }

    #[test]
    fn test_has_loop_budget() {
        let nodes = tree();
        let messages = vec![
            Message::new("m1", "n1", 0.0),
            Message::new("m2", "n1", 1.0),
            Message::new("m3", "n2", 0.0),
        ];
        let strict = BranchWalker::new(BranchConfig {
            loop_budget_factor: 0,
        });

        assert!(strict.has_loop(&messages, &nodes, &BranchChoices::new(), None));
        assert!(!has_loop(&messages, &nodes, &BranchChoices::new(), None));
    }

    #[test]
    fn test_has_loop_budget_of_one_defers_to_revisits() {
        let nodes = tree();
        let messages = vec![
            Message::new("m1", "n1", 0.0),
            Message::branch("B", "n1", 1.0, vec![go("back", "n1", "m1"), go("on", "n2", "m4")]),
            Message::new("m4", "n2", 0.0),
        ];
        let tight = BranchWalker::new(BranchConfig {
            loop_budget_factor: 1,
        });
        let choices = BranchChoices::new();

        assert!(!tight.has_loop(&messages, &nodes, &choices, Some(("B", "on"))));
        assert!(tight.has_loop(&messages, &nodes, &choices, Some(("B", "back"))));
        assert_eq!(
            tight.has_loop(&messages, &nodes, &choices, Some(("B", "back"))),
            has_loop(&messages, &nodes, &choices, Some(("B", "back")))
        );
    }

    #[test]
    fn test_has_loop_on_empty_story() {
        assert!(!has_loop(&[], &tree(), &BranchChoices::new(), None));
    }

    #[test]
    fn test_next_message_in_path() {
        let nodes = tree();
        let messages = forked();
        let choices: BranchChoices = [("B", "a")].into_iter().collect();
        let next = |id: &str| next_message_in_path(id, &messages, &nodes, &choices).map(|m| m.id.as_str());

        assert_eq!(next("m1"), Some("B"));
        assert_eq!(next("B"), Some("m5"));
        assert_eq!(next("m2"), Some("m4"));
        assert_eq!(next("m5"), Some("m6"));
        assert_eq!(next("m6"), None);
        assert_eq!(next("ghost"), None);

        let unresolved = next_message_in_path("B", &messages, &nodes, &BranchChoices::new());
        assert!(unresolved.is_none());
    }

    #[test]
    fn test_option_builders() {
        let messages = forked();

        let option = option_to_node("Onward", "n2", &messages).unwrap();
        assert_eq!(option.target_node_id, NodeId::from("n2"));
        assert_eq!(option.target_message_id, MessageId::from("m4"));
        assert_eq!(option.label, "Onward");
        assert!(option_to_node("Nowhere", "b1", &messages).is_none());

        let local = option_in_chapter("Again", "m1", "n1");
        assert_eq!(local.target_node_id, NodeId::from("n1"));
        assert_ne!(local.id, option.id);
    }
}
