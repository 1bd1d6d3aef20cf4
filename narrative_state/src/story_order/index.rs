//! Arena index over the story tree, built once per pass.

use std::cmp::Ordering;
use std::collections::HashMap;

use story_model::{Message, Node};
use tracing::warn;

/// Integer handle of a node inside a [`StoryIndex`].
pub type NodeHandle = usize;

/// Flat arena of nodes with a parent → sorted-children index.
///
/// Handles are positions in the input slice. Sibling lists are sorted by `order`
/// with a stable sort, so equal keys keep their input order.
#[derive(Debug, Clone)]
pub struct StoryIndex<'a> {
    nodes: &'a [Node],
    by_id: HashMap<&'a str, NodeHandle>,
    children: Vec<Vec<NodeHandle>>,
    roots: Vec<NodeHandle>,
}

impl<'a> StoryIndex<'a> {
    /// Index `nodes`. A node whose parent id matches no node is unreachable.
    pub fn new(nodes: &'a [Node]) -> Self {
        let mut by_id = HashMap::with_capacity(nodes.len());
        for (handle, node) in nodes.iter().enumerate() {
            by_id.entry(node.id.as_str()).or_insert(handle);
        }

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();

        for (handle, node) in nodes.iter().enumerate() {
            match node.parent_id.as_ref().map(|p| p.as_str()) {
                None | Some("") => roots.push(handle),
                Some(parent) => match by_id.get(parent) {
                    Some(&parent_handle) => children[parent_handle].push(handle),
                    None => {
                        warn!(node_id = %node.id, parent_id = parent, "Node parent not found, node is unreachable");
                    }
                },
            }
        }

        let by_order = |a: &NodeHandle, b: &NodeHandle| {
            nodes[*a]
                .order
                .partial_cmp(&nodes[*b].order)
                .unwrap_or(Ordering::Equal)
        };
        roots.sort_by(by_order);
        for siblings in &mut children {
            siblings.sort_by(by_order);
        }

        Self {
            nodes,
            by_id,
            children,
            roots,
        }
    }

    pub fn node(&self, handle: NodeHandle) -> &'a Node {
        &self.nodes[handle]
    }

    pub fn handle_of(&self, id: &str) -> Option<NodeHandle> {
        self.by_id.get(id).copied()
    }

    /// Look up a node by id.
    pub fn get(&self, id: &str) -> Option<&'a Node> {
        self.handle_of(id).map(|handle| &self.nodes[handle])
    }

    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        &self.children[handle]
    }

    pub fn roots(&self) -> &[NodeHandle] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order depth-first traversal from every root.
    pub fn preorder(&self) -> PreOrder<'_, 'a> {
        PreOrder {
            index: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// All reachable nodes in story order.
    pub fn ordered(&self) -> Vec<&'a Node> {
        self.preorder().map(|handle| self.node(handle)).collect()
    }

    /// Story order truncated right after `target`; empty when `target` is unknown.
    pub fn ordered_up_to(&self, target: &str) -> Vec<&'a Node> {
        if self.handle_of(target).is_none() {
            return Vec::new();
        }

        let mut result = Vec::new();
        for handle in self.preorder() {
            let node = self.node(handle);
            result.push(node);
            if node.id.as_str() == target {
                break;
            }
        }
        result
    }
}

/// Iterator over node handles in pre-order.
pub struct PreOrder<'i, 'a> {
    index: &'i StoryIndex<'a>,
    stack: Vec<NodeHandle>,
}

impl Iterator for PreOrder<'_, '_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<NodeHandle> {
        let handle = self.stack.pop()?;
        self.stack
            .extend(self.index.children(handle).iter().rev().copied());
        Some(handle)
    }
}

/// Group messages by owning node, each group sorted by `order` (stable).
///
/// Messages without a node are left out.
pub fn group_by_node(messages: &[Message]) -> HashMap<&str, Vec<&Message>> {
    let mut groups: HashMap<&str, Vec<&Message>> = HashMap::new();
    for message in messages {
        if let Some(node_id) = &message.node_id {
            groups.entry(node_id.as_str()).or_default().push(message);
        }
    }

    for group in groups.values_mut() {
        group.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(Ordering::Equal));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(nodes: &[&Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn test_parent_listed_after_child() {
        let nodes = vec![
            Node::chapter("c1", 0.0).with_parent("a1"),
            Node::arc("a1", 0.0),
        ];
        let index = StoryIndex::new(&nodes);

        assert_eq!(index.roots(), &[1]);
        assert_eq!(index.children(1), &[0]);
        assert_eq!(ids(&index.ordered()), vec!["a1", "c1"]);
    }

    #[test]
    fn test_empty_parent_id_is_root() {
        let nodes = vec![Node::book("b1", 0.0).with_parent("")];
        let index = StoryIndex::new(&nodes);
        assert_eq!(index.roots(), &[0]);
    }

    #[test]
    fn test_orphan_is_unreachable() {
        let nodes = vec![
            Node::book("b1", 0.0),
            Node::chapter("lost", 0.0).with_parent("missing"),
        ];
        let index = StoryIndex::new(&nodes);

        assert_eq!(ids(&index.ordered()), vec!["b1"]);
        assert!(index.get("lost").is_some());
    }

    #[test]
    fn test_cycle_is_never_traversed() {
        let nodes = vec![
            Node::book("b1", 0.0),
            Node::arc("x", 0.0).with_parent("y"),
            Node::arc("y", 0.0).with_parent("x"),
        ];
        let index = StoryIndex::new(&nodes);
        assert_eq!(ids(&index.ordered()), vec!["b1"]);
    }

    #[test]
    fn test_ordered_up_to_unknown_target() {
        let nodes = vec![Node::book("b1", 0.0)];
        let index = StoryIndex::new(&nodes);
        assert!(index.ordered_up_to("nope").is_empty());
    }

    #[test]
    fn test_group_by_node() {
        let messages = vec![
            Message::new("m2", "c1", 1.0),
            Message::detached("loose", 0.0),
            Message::new("m1", "c1", 0.0),
            Message::new("m3", "c2", 0.0),
            Message::new("m1b", "c1", 0.0),
        ];
        let groups = group_by_node(&messages);

        let c1: Vec<_> = groups["c1"].iter().map(|m| m.id.as_str()).collect();
        assert_eq!(c1, vec!["m1", "m1b", "m2"]);
        assert_eq!(groups["c2"].len(), 1);
        assert_eq!(groups.len(), 2);
    }
}
