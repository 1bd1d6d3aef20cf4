//! Script Execution Engine - replays user scripts against an evolving world state.
//!
//! Replaying up to a message works as follows:
//! 1. **Global**: Run the global script, which may replace the data and export functions
//! 2. **Bootstrap**: Give the state a `currentTime` if the global script did not
//! 3. **Walk**: Visit messages in story order up to the target
//! 4. **Clock**: On every node transition, set or reset the story time
//! 5. **Run**: Execute each replayable message script on a draft of the state
//! 6. **Rollback**: A failing script leaves the state as it was and is recorded

mod clock;
mod function;
mod native;
mod rhai_script;

pub use clock::*;
pub use function::*;
pub use native::*;
pub use rhai_script::*;

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use story_model::{EngineConfig, Message, MessageId, MinuteFormatter, Node, NodeId, TimeFormatter, WorldState};
use tracing::{debug, warn};

use crate::error::NarrativeError;
use crate::story_order::{messages_up_to, StoryIndex};

/// What a script invocation evaluated to.
pub enum ScriptReturn {
    /// Nothing; the usual case for message scripts.
    Unit,
    /// A plain value. Ignored by the engine.
    Value(Value),
    /// A global script's exports: replacement data and a function table.
    Exports {
        data: Map<String, Value>,
        functions: FunctionTable,
    },
}

impl fmt::Debug for ScriptReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptReturn::Unit => f.write_str("Unit"),
            ScriptReturn::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ScriptReturn::Exports { data, functions } => f
                .debug_struct("Exports")
                .field("data", data)
                .field("functions", functions)
                .finish(),
        }
    }
}

/// A compiled script, ready to run against a draft state.
pub trait CompiledScript: Send + Sync {
    /// Run with `data` bound to the draft and `functions` callable.
    ///
    /// Only a [`ScriptMode::Global`] run reports [`ScriptReturn::Exports`].
    fn invoke(
        &self,
        data: &mut WorldState,
        functions: &FunctionTable,
        mode: ScriptMode,
    ) -> Result<ScriptReturn, ScriptFault>;
}

/// Turns script source into something runnable.
pub trait ScriptCompiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledScript>, ScriptFault>;
}

/// How a script's return value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Exports replace the data and the function table.
    Global,
    /// The return value is ignored.
    Message,
}

/// Where a script lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOwner {
    Global,
    Message {
        message_id: MessageId,
        node_id: Option<NodeId>,
    },
}

impl ScriptOwner {
    pub fn of(message: &Message) -> Self {
        ScriptOwner::Message {
            message_id: message.id.clone(),
            node_id: message.node_id.clone(),
        }
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            ScriptOwner::Global => None,
            ScriptOwner::Message { message_id, .. } => Some(message_id),
        }
    }
}

impl fmt::Display for ScriptOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptOwner::Global => write!(f, "global script"),
            ScriptOwner::Message {
                message_id,
                node_id: Some(node_id),
            } => write!(f, "script of message `{}` in node `{}`", message_id, node_id),
            ScriptOwner::Message { message_id, .. } => {
                write!(f, "script of message `{}`", message_id)
            }
        }
    }
}

/// A single script failed. The state it ran on is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("{owner} failed to compile: {reason}")]
    Compile {
        owner: ScriptOwner,
        script: String,
        reason: String,
    },

    #[error("{owner} failed: {reason}")]
    Evaluation {
        owner: ScriptOwner,
        script: String,
        reason: String,
    },
}

impl ScriptError {
    pub fn owner(&self) -> &ScriptOwner {
        match self {
            ScriptError::Compile { owner, .. } | ScriptError::Evaluation { owner, .. } => owner,
        }
    }

    /// The offending source text.
    pub fn script(&self) -> &str {
        match self {
            ScriptError::Compile { script, .. } | ScriptError::Evaluation { script, .. } => script,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ScriptError::Compile { reason, .. } | ScriptError::Evaluation { reason, .. } => reason,
        }
    }
}

/// Result of one successful script run.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub state: WorldState,
    /// Set only when a global script exported functions.
    pub functions: Option<FunctionTable>,
}

/// Result of a replay: the final state and every script that failed on the way.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    pub state: WorldState,
    pub functions: FunctionTable,
    pub failures: Vec<ScriptError>,
}

impl Replay {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs scripts through a pluggable compiler.
#[derive(Clone)]
pub struct ScriptEngine {
    compiler: Arc<dyn ScriptCompiler>,
    formatter: Arc<dyn TimeFormatter>,
    config: EngineConfig,
}

impl ScriptEngine {
    /// Create an engine with default configuration and raw-minute dates.
    pub fn new(compiler: impl ScriptCompiler + 'static) -> Self {
        Self {
            compiler: Arc::new(compiler),
            formatter: Arc::new(MinuteFormatter),
            config: EngineConfig::default(),
        }
    }

    /// Create an engine evaluating Rhai scripts under `config`.
    pub fn rhai(config: EngineConfig) -> Self {
        Self::new(RhaiCompiler::new(&config.script)).with_config(config)
    }

    pub fn with_formatter(mut self, formatter: impl TimeFormatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn formatter(&self) -> &dyn TimeFormatter {
        self.formatter.as_ref()
    }

    /// Run one script on a copy of `state`.
    ///
    /// `state` is never modified. In [`ScriptMode::Global`], exported data replaces
    /// every key of the copy and exported functions are handed back.
    pub fn run_script(
        &self,
        source: &str,
        state: &WorldState,
        functions: &FunctionTable,
        mode: ScriptMode,
        owner: ScriptOwner,
    ) -> Result<ScriptOutput, ScriptError> {
        let compiled = match self.compiler.compile(source) {
            Ok(compiled) => compiled,
            Err(fault) => {
                return Err(ScriptError::Compile {
                    owner,
                    script: source.to_string(),
                    reason: fault.to_string(),
                })
            }
        };

        let mut draft = state.clone();
        let returned = match compiled.invoke(&mut draft, functions, mode) {
            Ok(returned) => returned,
            Err(fault) => {
                return Err(ScriptError::Evaluation {
                    owner,
                    script: source.to_string(),
                    reason: fault.to_string(),
                })
            }
        };

        let mut exported = None;
        if let (ScriptMode::Global, ScriptReturn::Exports { data, functions }) = (mode, returned) {
            draft.replace_with(data);
            exported = Some(functions);
        }

        Ok(ScriptOutput {
            state: draft,
            functions: exported,
        })
    }

    /// Whether `message` carries a script that a direct replay runs.
    pub fn is_scripted(&self, message: &Message) -> bool {
        message.script_source().is_some() && !message.is_query
    }

    /// Whether `message`'s script takes part in the cached replay.
    ///
    /// Narrower than [`ScriptEngine::is_scripted`]: only roles listed in
    /// `replay.script_roles` count.
    pub fn replays(&self, message: &Message) -> bool {
        self.is_scripted(message) && self.config.replay.replays_role(message.role)
    }

    /// Replay the global script and every message script up to `target`.
    ///
    /// Query messages are skipped; every role runs. Script failures are collected,
    /// never raised. Fails only when `target` is not one of `messages`.
    pub fn replay_up_to(
        &self,
        messages: &[Message],
        target: &str,
        nodes: &[Node],
        global_script: Option<&str>,
    ) -> Result<Replay, NarrativeError> {
        let ordered = messages_up_to(messages, nodes, target)?;
        let mut replay = Replay::default();

        self.run_global(global_script, &mut replay);
        self.bootstrap_time(&mut replay.state);

        let index = StoryIndex::new(nodes);
        let mut clock = self.clock();

        for message in &ordered {
            clock.enter(message, &index, &mut replay.state, self.formatter());
            if self.is_scripted(message) {
                self.run_message(message, &mut replay);
            }
        }

        debug!(
            target_id = target,
            messages = ordered.len(),
            failures = replay.failures.len(),
            "Replay finished"
        );
        Ok(replay)
    }

    /// Run the global script into `replay`, keeping the state on failure.
    pub(crate) fn run_global(&self, global_script: Option<&str>, replay: &mut Replay) {
        let Some(source) = global_script.filter(|s| !s.trim().is_empty()) else {
            return;
        };

        match self.run_script(
            source,
            &replay.state,
            &replay.functions,
            ScriptMode::Global,
            ScriptOwner::Global,
        ) {
            Ok(output) => {
                replay.state = output.state;
                if let Some(functions) = output.functions {
                    replay.functions = functions;
                }
            }
            Err(err) => self.record(err, replay),
        }
    }

    /// Run `message`'s script into `replay`, keeping the state on failure.
    ///
    /// Returns whether there was a script to run.
    pub(crate) fn run_message(&self, message: &Message, replay: &mut Replay) -> bool {
        let Some(source) = message.script_source() else {
            return false;
        };

        match self.run_script(
            source,
            &replay.state,
            &replay.functions,
            ScriptMode::Message,
            ScriptOwner::of(message),
        ) {
            Ok(output) => replay.state = output.state,
            Err(err) => self.record(err, replay),
        }
        true
    }

    /// Give `state` a story time if it has none. A time the global script set, of
    /// any shape, is left alone.
    pub(crate) fn bootstrap_time(&self, state: &mut WorldState) {
        if !state.has_time() {
            state.set_story_time(self.config.replay.initial_time, self.formatter());
        }
    }

    /// A clock whose base for untimed chapters is `replay.initial_time`.
    pub(crate) fn clock(&self) -> StoryClock {
        StoryClock::new(self.config.replay.initial_time)
    }

    fn record(&self, err: ScriptError, replay: &mut Replay) {
        warn!(owner = %err.owner(), reason = err.reason(), "Script failed, state rolled back");
        replay.failures.push(err);
    }
}

impl fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
