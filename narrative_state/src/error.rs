//! Structural errors raised by the derivation engine.

use story_model::MessageId;
use thiserror::Error;

/// Failures that indicate the caller and the story data are out of sync.
///
/// Script failures are not here: they are per-script and never abort a pass
/// (see [`crate::script::ScriptError`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrativeError {
    /// A message id the caller guaranteed to exist is not in the story.
    #[error("structural lookup failure: message `{0}` is not part of the story")]
    MessageNotFound(MessageId),
}
