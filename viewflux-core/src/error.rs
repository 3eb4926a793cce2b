//! Error types
//!
//! Configuration errors are returned as `Err` from the call that detected
//! them. Recoverable problems (schema rejections, missing plugins, unknown
//! popups) never show up here; they are reported on the
//! [`EventBus`](crate::bus::EventBus) error channel instead.

use thiserror::Error;

use crate::view::ViewId;

/// Fatal errors raised while draining the action queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No reducer is registered under the action's type.
    #[error(
        "unregistered reducer for action `{action_type}`: register a reducer for this type before dispatching it"
    )]
    UnregisteredReducer { action_type: String },

    /// The subscriber attached to the action is not callable.
    #[error("subscriber `{subscriber}` for action `{action_type}` is not a callable listener")]
    InvalidSubscriber {
        action_type: String,
        subscriber: String,
    },
}

/// Errors raised by the selector parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character `{found}` at {position} in selector `{selector}`")]
    Unexpected {
        selector: String,
        found: char,
        position: usize,
    },
    #[error("unterminated attribute selector in `{0}`")]
    UnterminatedAttribute(String),
}

/// Errors raised by the markup parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unexpected closing tag `</{found}>` at byte {position}")]
    UnexpectedClose { found: String, position: usize },
    #[error("closing tag `</{found}>` does not match open `<{expected}>` at byte {position}")]
    MismatchedClose {
        expected: String,
        found: String,
        position: usize,
    },
    #[error("unclosed element `<{0}>`")]
    Unclosed(String),
    #[error("malformed tag at byte {0}")]
    MalformedTag(usize),
}

/// Fatal errors raised by view construction, mounting and event wiring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("[{view}] required attribute \"container\" is missing")]
    MissingContainer { view: String },

    #[error("[{view}] container `{selector}` did not resolve to any element")]
    EmptyContainer { view: String, selector: String },

    #[error("[{view}] {source}")]
    InvalidSelector {
        view: String,
        #[source]
        source: SelectorError,
    },

    #[error("[{view}] template produced malformed markup: {source}")]
    Markup {
        view: String,
        #[source]
        source: MarkupError,
    },

    #[error("[{view}] event handler `{handler}` is not defined")]
    UnresolvedHandler { view: String, handler: String },

    #[error("[{view}] malformed event declaration `{key}`")]
    MalformedEvent { view: String, key: String },

    #[error("[{view}] row container `{selector}` is undefined")]
    MissingRowContainer { view: String, selector: String },

    #[error("[{view}] is not a collection view")]
    NotACollection { view: String },

    #[error("unknown view {id}")]
    UnknownView { id: ViewId },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,
}
