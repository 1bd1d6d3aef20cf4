//! Cumulative-State Cache - memoized replay snapshots with explicit invalidation.
//!
//! A recompute replays the whole story once and keeps, for every replayed
//! message, the state before and after its script. Reads walk the story order
//! up to a target and pick up the latest snapshot on the way, so they never run
//! a script themselves.

mod fingerprint;
mod shared;

pub use fingerprint::*;
pub use shared::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use story_model::{
    Character, ContextItem, Message, MessageId, Node, NodeId, StateChange, Story, WorldState,
};
use tracing::{debug, info};

use crate::error::NarrativeError;
use crate::script::{FunctionTable, Replay, ScriptEngine, ScriptError};
use crate::story_order::{messages_in_story_order, messages_up_to, StoryIndex};

/// Read access to the story inputs a replay depends on.
pub trait StorySource {
    fn nodes(&self) -> &[Node];
    fn messages(&self) -> &[Message];
    fn global_script(&self) -> Option<&str>;
    fn characters(&self) -> &[Character];
    fn context_items(&self) -> &[ContextItem];
}

impl StorySource for Story {
    fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn global_script(&self) -> Option<&str> {
        self.global_script.as_deref()
    }

    fn characters(&self) -> &[Character] {
        &self.characters
    }

    fn context_items(&self) -> &[ContextItem] {
        &self.context_items
    }
}

/// The state around one script run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub before: WorldState,
    pub after: WorldState,
}

/// What changed while the replay was inside one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeChangeSummary {
    pub node_id: NodeId,
    pub node_title: String,
    pub changes: Vec<StateChange>,
    /// The state when the replay left the node.
    pub final_state: WorldState,
}

/// Memoized replay of a whole story.
///
/// The cache starts dirty. Every read first compares the story against the
/// inputs of the last recompute and rebuilds when they differ.
#[derive(Debug)]
pub struct CumulativeStateCache {
    engine: ScriptEngine,
    global: Option<Snapshot>,
    base: WorldState,
    snapshots: HashMap<MessageId, Snapshot>,
    node_changes: Vec<NodeChangeSummary>,
    changes_by_node: HashMap<NodeId, usize>,
    functions: FunctionTable,
    failures: Vec<ScriptError>,
    dirty: bool,
    fingerprint: Option<InputFingerprint>,
}

impl CumulativeStateCache {
    pub fn new(engine: ScriptEngine) -> Self {
        Self {
            engine,
            global: None,
            base: WorldState::new(),
            snapshots: HashMap::new(),
            node_changes: Vec::new(),
            changes_by_node: HashMap::new(),
            functions: FunctionTable::new(),
            failures: Vec::new(),
            dirty: true,
            fingerprint: None,
        }
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    /// Mark the cache stale. The next read recomputes.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the cache stale if any replay input changed since the last recompute.
    ///
    /// Returns whether the cache is dirty afterwards.
    pub fn observe<S: StorySource + ?Sized>(&mut self, source: &S) -> bool {
        let current = InputFingerprint::capture(source, &self.engine);
        if self.fingerprint.as_ref() != Some(&current) {
            debug!("Story inputs changed, cache invalidated");
            self.dirty = true;
        }
        self.dirty
    }

    /// Recompute if the story changed or the cache was invalidated, then hand
    /// back the cache for reading.
    pub fn get_or_recompute<S: StorySource + ?Sized>(&mut self, source: &S) -> &Self {
        if self.observe(source) {
            self.recompute(source);
        }
        self
    }

    /// Replay the whole story and rebuild every snapshot and node summary.
    pub fn recompute<S: StorySource + ?Sized>(&mut self, source: &S) {
        self.dirty = true;
        self.clear();

        let nodes = source.nodes();
        let mut replay = Replay::default();

        // Step 1: Global script and bootstrap
        let global_script = source.global_script().filter(|s| !s.trim().is_empty());
        if global_script.is_some() {
            self.engine.run_global(global_script, &mut replay);
        }
        self.engine.bootstrap_time(&mut replay.state);
        replay
            .state
            .seed_identities(source.characters(), source.context_items());

        if global_script.is_some() {
            self.global = Some(Snapshot {
                before: WorldState::new(),
                after: replay.state.clone(),
            });
        }
        self.base = replay.state.clone();

        // Step 2: Walk the full story order
        let index = StoryIndex::new(nodes);
        let ordered: Vec<&Message> = if nodes.is_empty() {
            source.messages().iter().collect()
        } else {
            messages_in_story_order(source.messages(), nodes)
        };

        let mut clock = self.engine.clock();
        let mut open_node: Option<(NodeId, WorldState)> = None;

        for message in &ordered {
            if let Some(node_id) = &message.node_id {
                if clock.current_node() != Some(node_id) {
                    if let Some((previous, start)) = open_node.take() {
                        self.close_node(previous, &start, &replay.state, &index);
                    }
                    open_node = Some((node_id.clone(), replay.state.clone()));
                }
            }

            clock.enter(message, &index, &mut replay.state, self.engine.formatter());

            if self.engine.replays(message) {
                let before = replay.state.clone();
                self.engine.run_message(message, &mut replay);
                self.snapshots.insert(
                    message.id.clone(),
                    Snapshot {
                        before,
                        after: replay.state.clone(),
                    },
                );
            }
        }

        if let Some((last, start)) = open_node.take() {
            self.close_node(last, &start, &replay.state, &index);
        }

        // Step 3: Publish
        self.functions = replay.functions;
        self.failures = replay.failures;
        self.fingerprint = Some(InputFingerprint::capture(source, &self.engine));
        self.dirty = false;

        info!(
            messages = ordered.len(),
            snapshots = self.snapshots.len(),
            node_changes = self.node_changes.len(),
            failures = self.failures.len(),
            "Cumulative state recomputed"
        );
    }

    /// The cumulative state right after `target`, from cached snapshots.
    ///
    /// `Ok(None)` when the story has no nodes, `target` is unknown, or `target` has
    /// no node; callers then replay directly (see [`CumulativeStateCache::state_at`]).
    pub fn cumulative_at<S: StorySource + ?Sized>(
        &mut self,
        source: &S,
        target: &str,
        force_refresh: bool,
    ) -> Result<Option<WorldState>, NarrativeError> {
        if force_refresh {
            self.recompute(source);
        } else {
            self.get_or_recompute(source);
        }

        let nodes = source.nodes();
        let messages = source.messages();
        if nodes.is_empty() {
            return Ok(None);
        }
        let Some(message) = messages.iter().find(|m| m.id.as_str() == target) else {
            return Ok(None);
        };
        if message.node_id.is_none() {
            return Ok(None);
        }

        let index = StoryIndex::new(nodes);
        let mut clock = self.engine.clock();
        let mut state = self.base.clone();

        for message in messages_up_to(messages, nodes, target)? {
            clock.enter(message, &index, &mut state, self.engine.formatter());
            if let Some(snapshot) = self.snapshots.get(message.id.as_str()) {
                state = snapshot.after.clone();
            }
        }

        Ok(Some(state))
    }

    /// The cumulative state right after `target`, replaying directly on a cache miss.
    pub fn state_at<S: StorySource + ?Sized>(
        &mut self,
        source: &S,
        target: &str,
    ) -> Result<WorldState, NarrativeError> {
        if let Some(state) = self.cumulative_at(source, target, false)? {
            return Ok(state);
        }

        debug!(target_id = target, "Cache miss, replaying directly");
        let replay = self.engine.replay_up_to(
            source.messages(),
            target,
            source.nodes(),
            source.global_script(),
        )?;
        Ok(replay.state)
    }

    /// The change summary recorded for `node_id`, if it changed anything.
    pub fn changes_for(&self, node_id: &str) -> Option<&NodeChangeSummary> {
        self.changes_by_node
            .get(node_id)
            .map(|&position| &self.node_changes[position])
    }

    /// Every recorded node summary, in story order.
    pub fn all_changes(&self) -> &[NodeChangeSummary] {
        &self.node_changes
    }

    pub fn snapshot(&self, message_id: &str) -> Option<&Snapshot> {
        self.snapshots.get(message_id)
    }

    pub fn global_snapshot(&self) -> Option<&Snapshot> {
        self.global.as_ref()
    }

    /// Functions exported by the global script at the last recompute.
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Scripts that failed during the last recompute.
    pub fn failures(&self) -> &[ScriptError] {
        &self.failures
    }

    fn close_node(&mut self, node_id: NodeId, start: &WorldState, end: &WorldState, index: &StoryIndex<'_>) {
        let changes = start.diff(end);
        if changes.is_empty() {
            return;
        }

        let node_title = index
            .get(node_id.as_str())
            .map(|node| node.title.clone())
            .unwrap_or_default();

        self.changes_by_node
            .insert(node_id.clone(), self.node_changes.len());
        self.node_changes.push(NodeChangeSummary {
            node_id,
            node_title,
            changes,
            final_state: end.clone(),
        });
    }

    fn clear(&mut self) {
        self.global = None;
        self.base = WorldState::new();
        self.snapshots.clear();
        self.node_changes.clear();
        self.changes_by_node.clear();
        self.functions = FunctionTable::new();
        self.failures.clear();
    }
}
