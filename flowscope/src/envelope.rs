//! Restoration envelopes for tasks that cross a serialization boundary.
//!
//! Engines that ship a task to another process or worker lose the thread's
//! context on the way. The caller side captures a [`ContextEnvelope`] next to
//! the task's arguments; the worker side restores it before the tracked
//! function decides whether it is a top-level call.

use crate::context::{
    get_context, get_directory_context, restore_context, ContextStack, RestoreGuard,
};
use crate::errors::{FlowscopeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Wire name of the captured context stack.
pub const CONTEXT_FIELD: &str = "__flowscope_ctx";

/// Wire name of the captured directory context.
pub const DIRECTORY_FIELD: &str = "__flowscope_dir";

/// Context captured on the caller side of a task boundary.
///
/// Either part may be absent, which means "leave that part of the receiving
/// context alone". A part that is present but malformed decodes as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEnvelope {
    /// The captured context stack.
    #[serde(
        rename = "__flowscope_ctx",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_context"
    )]
    pub ctx: Option<ContextStack>,
    /// The captured directory context.
    #[serde(
        rename = "__flowscope_dir",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_directory"
    )]
    pub dir: Option<String>,
}

impl ContextEnvelope {
    /// Creates an envelope that restores nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ctx: None,
            dir: None,
        }
    }

    /// Creates an envelope from explicit parts.
    #[must_use]
    pub fn new(ctx: ContextStack, dir: impl Into<String>) -> Self {
        Self {
            ctx: Some(ctx),
            dir: Some(dir.into()),
        }
    }

    /// Captures the caller's current context stack and directory.
    #[must_use]
    pub fn capture() -> Self {
        Self::new(get_context(), get_directory_context())
    }

    /// Returns true if nothing would be restored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ctx.is_none() && self.dir.is_none()
    }

    /// Restores the captured parts for the lifetime of the returned guard.
    pub fn restore(self) -> RestoreGuard {
        restore_context(self.ctx, self.dir)
    }

    /// Removes the reserved fields from a JSON object and decodes them.
    ///
    /// A field that is missing, `null`, or malformed is treated as absent.
    pub fn take_from(map: &mut Map<String, Value>) -> Self {
        Self {
            ctx: take_field(map, CONTEXT_FIELD),
            dir: take_field(map, DIRECTORY_FIELD),
        }
    }
}

fn take_field<T: DeserializeOwned>(map: &mut Map<String, Value>, field: &str) -> Option<T> {
    decode_field(map.remove(field)?, field)
}

fn decode_field<T: DeserializeOwned>(value: Value, field: &str) -> Option<T> {
    match value {
        Value::Null => None,
        value => serde_json::from_value(value)
            .map_err(|e| debug!(field, error = %e, "Ignoring malformed envelope field"))
            .ok(),
    }
}

fn lenient_context<'de, D>(deserializer: D) -> Result<Option<ContextStack>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(decode_field(Value::deserialize(deserializer)?, CONTEXT_FIELD))
}

fn lenient_directory<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(decode_field(Value::deserialize(deserializer)?, DIRECTORY_FIELD))
}

/// A task's arguments together with the context captured for them.
///
/// On the wire the envelope fields sit next to an `args` field:
/// `{"__flowscope_ctx": [...], "__flowscope_dir": "...", "args": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enveloped<A> {
    /// The captured context.
    #[serde(flatten)]
    pub envelope: ContextEnvelope,
    /// The task's own arguments.
    pub args: A,
}

impl<A> Enveloped<A> {
    /// Wraps `args` with an explicit envelope.
    pub const fn new(args: A, envelope: ContextEnvelope) -> Self {
        Self { envelope, args }
    }

    /// Wraps `args` with the caller's current context.
    pub fn capture(args: A) -> Self {
        Self::new(args, ContextEnvelope::capture())
    }

    /// Wraps `args` without any context to restore.
    pub const fn bare(args: A) -> Self {
        Self::new(args, ContextEnvelope::empty())
    }

    /// Splits into arguments and envelope.
    pub fn into_parts(self) -> (A, ContextEnvelope) {
        (self.args, self.envelope)
    }
}

impl<A: Serialize> Enveloped<A> {
    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<A: DeserializeOwned> Enveloped<A> {
    /// Decodes a JSON payload. Malformed envelope fields are ignored; only
    /// the arguments must decode.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Decodes a JSON value. See [`Enveloped::from_json`].
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(FlowscopeError::Serialization(
                "enveloped payload must be a JSON object".to_string(),
            ));
        };
        let envelope = ContextEnvelope::take_from(&mut map);
        let args = serde_json::from_value(map.remove("args").unwrap_or(Value::Null))?;
        Ok(Self { envelope, args })
    }
}
