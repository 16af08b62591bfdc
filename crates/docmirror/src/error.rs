//! Error type shared across the document graph, codecs, and patch protocol.

use thiserror::Error;

/// Errors reported by document operations.
///
/// Warnings (dropped unknown attributes during deserialization and patch
/// application) are logged instead of raised; see the `json` and `patch`
/// modules.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A lookup that requires a unique match found more than one.
    #[error("{0}")]
    Ambiguous(String),

    /// `destructively_move` called with the source document as destination.
    #[error("attempted to overwrite a document with itself")]
    SelfMove,

    /// A root still reported an owning document after being removed during a
    /// destructive move. Indicates a broken `Model` implementation.
    #[error("failed to detach model '{0}' during a destructive move")]
    DetachFailure(String),

    /// The model table was not empty after all roots were removed during a
    /// destructive move. Indicates a broken `Model` implementation.
    #[error("models still attached after removing all roots: {0:?}")]
    ResidualModels(Vec<String>),

    /// `remove_on_change` called with a listener that was never registered.
    #[error("listener was never added to this document")]
    UnknownListener,

    /// A session-callback removal referenced a callback that was never added.
    #[error("session callback was never added to this document")]
    UnknownCallback,

    /// A session callback was added twice with the same identity.
    #[error("session callback is already registered on this document")]
    AlreadyRegistered,

    /// A document or patch could not be reconstructed from JSON.
    #[error("error loading from JSON: {0}")]
    LoadFailure(String),

    /// A patch was requested for an event owned by a different document.
    #[error("cannot create a patch using events from a different document")]
    CrossDocument,

    /// A patch referenced a model id this document cannot resolve.
    #[error("cannot apply patch to '{0}' which is not in the document")]
    UnknownTarget(String),

    /// A patch event carried an unrecognized `kind` field.
    #[error("unknown patch event kind '{0}'")]
    UnknownPatchKind(String),

    /// Underlying JSON syntax error while parsing a document or patch string.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
