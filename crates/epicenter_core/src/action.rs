//! The action contract: the typed query/mutation surface an exports factory
//! builds from its tables, validators, and providers (spec.md §6).
//!
//! An [`Action`] pairs a description and a [`ActionKind`] (query or mutation)
//! with a handler from a deserialized input to a [`Result`]. [`Action::call`]
//! is the boundary every caller (CLI, HTTP, MCP — all out of scope for this
//! crate, spec.md §1/§6) goes through: it deserializes the raw input,
//! surfacing a shape mismatch as `ActionValidationError` without running the
//! handler, runs the handler with a panic isolated the same way a CRDT
//! observer's is (`table::Table::observe`), and tags the outcome `{data}` or
//! `{error}`. Handlers never need to construct that envelope themselves.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EpicenterError, Result, SerializableError};

/// Whether an action only reads state or may write it.
///
/// Advisory, not enforced by the type system: it exists so a CLI/HTTP/MCP
/// boundary (spec.md §6, out of scope here) can decide things like "queries
/// are GET, mutations are POST" without inspecting the handler body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Read-only; never mutates a table's rows or a provider's external state.
    Query,
    /// May mutate a table's rows or a provider's external state.
    Mutation,
}

/// The tagged result every action invocation produces (spec.md §6, §7):
/// `{data}` on success, `{error}` on failure. Handlers themselves return a
/// plain [`Result`]; [`Action::call`] performs this tagging so a handler can
/// never forget it or construct a malformed envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionOutcome<T> {
    /// The handler completed successfully.
    Data {
        /// The handler's result.
        data: T,
    },
    /// The handler failed — input validation, the handler's own error
    /// return, or a caught panic. No partial `data` accompanies this variant.
    Error {
        /// The error surfaced to the caller.
        error: SerializableError,
    },
}

impl<T> ActionOutcome<T> {
    /// Wrap a successful result.
    pub fn ok(data: T) -> Self {
        Self::Data { data }
    }

    /// Wrap a failure.
    pub fn err(error: impl Into<EpicenterError>) -> Self {
        Self::Error {
            error: error.into().to_serializable(),
        }
    }

    /// Convert a handler's `Result` into the tagged shape a caller expects.
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(err),
        }
    }

    /// The successful payload, if this outcome is `Data`.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Data { data } => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// Whether this outcome is `Error`.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One entry in a workspace's action surface (spec.md §6, "Action contract").
///
/// `Input` must be `DeserializeOwned`: the declared input schema is, per
/// spec.md, "Standard-Schema-compatible" — in this crate that compatibility
/// is just `serde`'s own `Deserialize`, the idiomatic equivalent, rather than
/// a bespoke schema-validation layer duplicating what `serde_json` already
/// does at the JSON boundary.
pub struct Action<Input, Output> {
    /// Human-readable description surfaced to a CLI's help text or an MCP
    /// tool listing (spec.md §6; both boundaries are out of scope here).
    pub description: &'static str,
    /// Whether this action reads or writes.
    pub kind: ActionKind,
    handler: Arc<dyn Fn(Input) -> Result<Output> + Send + Sync>,
}

impl<Input, Output> Action<Input, Output>
where
    Input: DeserializeOwned,
    Output: Serialize,
{
    /// Declare a query (read-only) action.
    pub fn query<F>(description: &'static str, handler: F) -> Self
    where
        F: Fn(Input) -> Result<Output> + Send + Sync + 'static,
    {
        Self {
            description,
            kind: ActionKind::Query,
            handler: Arc::new(handler),
        }
    }

    /// Declare a mutation (write) action.
    pub fn mutation<F>(description: &'static str, handler: F) -> Self
    where
        F: Fn(Input) -> Result<Output> + Send + Sync + 'static,
    {
        Self {
            description,
            kind: ActionKind::Mutation,
            handler: Arc::new(handler),
        }
    }

    /// Deserialize `raw` into `Input`, run the handler, and tag the result.
    ///
    /// A deserialization failure becomes `ActionValidationError` without
    /// invoking the handler (spec.md §7). A handler panic is caught and
    /// becomes `OperationError`, the same "exceptions never escape, they
    /// become `{error}`" rule spec.md §7 states for action handlers.
    pub fn call(&self, raw: Value) -> ActionOutcome<Output> {
        let input: Input = match serde_json::from_value(raw) {
            Ok(input) => input,
            Err(err) => {
                return ActionOutcome::err(EpicenterError::ActionValidation(err.to_string()));
            }
        };

        let handler = self.handler.clone();
        match std::panic::catch_unwind(AssertUnwindSafe(move || handler(input))) {
            Ok(result) => ActionOutcome::from_result(result),
            Err(_) => ActionOutcome::err(EpicenterError::Operation("action handler panicked".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Input {
        name: String,
    }

    #[test]
    fn query_runs_handler_and_tags_success() {
        let action: Action<Input, String> = Action::query("greet someone", |input| Ok(format!("hi {}", input.name)));
        assert_eq!(action.kind, ActionKind::Query);

        let outcome = action.call(json!({"name": "ada"}));
        assert_eq!(outcome.data(), Some(&"hi ada".to_string()));
        assert!(!outcome.is_error());
    }

    #[test]
    fn malformed_input_becomes_action_validation_error_without_running_handler() {
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        let action: Action<Input, String> = Action::mutation("never runs", move |input| {
            ran_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(input.name)
        });

        let outcome = action.call(json!({"wrong_field": 1}));
        assert!(outcome.is_error());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn handler_error_is_tagged_as_error_not_propagated() {
        let action: Action<Input, String> =
            Action::mutation("always fails", |_| Err(EpicenterError::Operation("boom".to_string())));
        let outcome = action.call(json!({"name": "ada"}));
        assert!(outcome.is_error());
    }

    #[test]
    fn handler_panic_is_caught_and_becomes_operation_error() {
        let action: Action<Input, String> = Action::mutation("panics", |_| panic!("unexpected"));
        let outcome = action.call(json!({"name": "ada"}));
        assert!(outcome.is_error());
    }

    #[test]
    fn outcome_serializes_with_a_status_tag() {
        let outcome: ActionOutcome<u32> = ActionOutcome::ok(7);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "data");
        assert_eq!(json["data"], 7);

        let outcome: ActionOutcome<u32> = ActionOutcome::err(EpicenterError::Operation("x".to_string()));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "OperationError");
    }
}
