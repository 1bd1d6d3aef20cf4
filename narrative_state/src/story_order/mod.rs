//! Story Order Resolver - deterministic linearization of the story tree.
//!
//! Nodes are ordered by a pre-order depth-first walk from every root, siblings
//! sorted ascending by `order` (ties keep input order). Messages follow the order
//! of their owning node, then their own `order` within it.

mod index;

pub use index::*;

use story_model::{Message, Node};
use tracing::warn;

use crate::error::NarrativeError;

/// Every reachable node in story order.
pub fn story_order(nodes: &[Node]) -> Vec<&Node> {
    StoryIndex::new(nodes).ordered()
}

/// Leaf-tier (chapter) nodes in story order.
pub fn chapter_order(nodes: &[Node]) -> Vec<&Node> {
    story_order(nodes)
        .into_iter()
        .filter(|node| node.is_leaf())
        .collect()
}

/// Nodes in story order up to and including `target`.
///
/// Empty when `target` is not one of `nodes`.
pub fn nodes_up_to<'a>(nodes: &'a [Node], target: &str) -> Vec<&'a Node> {
    StoryIndex::new(nodes).ordered_up_to(target)
}

/// Chapter nodes that come strictly before `target` in story order.
pub fn chapters_before<'a>(nodes: &'a [Node], target: &str) -> Vec<&'a Node> {
    nodes_up_to(nodes, target)
        .into_iter()
        .filter(|node| node.id.as_str() != target && node.is_leaf())
        .collect()
}

/// Messages in story order from the beginning up to and including `target`.
///
/// Fails when `target` is not one of `messages`. A target without an owning node
/// falls back to plain slice order up to the target.
pub fn messages_up_to<'a>(
    messages: &'a [Message],
    nodes: &[Node],
    target: &str,
) -> Result<Vec<&'a Message>, NarrativeError> {
    let position = messages
        .iter()
        .position(|m| m.id.as_str() == target)
        .ok_or_else(|| NarrativeError::MessageNotFound(target.into()))?;
    let target_message = &messages[position];

    let Some(target_node) = target_message.node_id.as_ref() else {
        warn!(
            message_id = target,
            role = ?target_message.role,
            kind = ?target_message.kind,
            "Target message has no node, falling back to array order"
        );
        return Ok(messages[..=position].iter().collect());
    };

    let index = StoryIndex::new(nodes);
    let groups = group_by_node(messages);
    let mut result = Vec::new();

    for node in index.ordered_up_to(target_node.as_str()) {
        let node_messages = groups.get(node.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);

        if node.id == *target_node {
            for message in node_messages {
                result.push(*message);
                if message.id.as_str() == target {
                    break;
                }
            }
            break;
        }

        result.extend(node_messages.iter().copied());
    }

    Ok(result)
}

/// Every node's messages in full story order.
///
/// Messages without a node, or whose node is unreachable, are left out.
pub fn messages_in_story_order<'a>(messages: &'a [Message], nodes: &[Node]) -> Vec<&'a Message> {
    let index = StoryIndex::new(nodes);
    let mut groups = group_by_node(messages);

    index
        .preorder()
        .filter_map(|handle| groups.remove(index.node(handle).id.as_str()))
        .flatten()
        .collect()
}

/// The generation history up to `target`: [`messages_up_to`] without query messages.
pub fn history_up_to<'a>(
    messages: &'a [Message],
    nodes: &[Node],
    target: &str,
) -> Result<Vec<&'a Message>, NarrativeError> {
    Ok(messages_up_to(messages, nodes, target)?
        .into_iter()
        .filter(|message| !message.is_query)
        .collect())
}
