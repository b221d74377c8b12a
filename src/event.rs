//! Events and the causal edges linking them.
//!
//! An [`Event`] is one recorded point in the trace graph: an owned
//! [`TraceContext`] with a freshly minted op id, zero or more parent op ids
//! (the incoming edges of the DAG), and a list of typed key-value
//! attachments. Events are built through an [`EventBuilder`], which owns the
//! [`IdGenerator`] used to mint operation identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EventError;
use crate::id_generator::{IdGenerator, RandomIdGenerator};
use crate::trace_context::{Format, OpId, TraceContext};

/// Largest magnitude exactly representable by an IEEE 754 double.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// The value part of an event key-value attachment.
///
/// Values classify themselves on ingest:
///
/// * numbers outside the safe-integer range (±2^53−1) become [`F64`] rather
///   than [`I64`], so they survive serialization without silent truncation;
/// * strings containing an embedded NUL become [`Bytes`] rather than
///   [`Str`].
///
/// The NUL heuristic matches the wire format's text/binary split; text that
/// legitimately embeds NUL bytes will be carried as binary.
///
/// [`F64`]: InfoValue::F64
/// [`I64`]: InfoValue::I64
/// [`Bytes`]: InfoValue::Bytes
/// [`Str`]: InfoValue::Str
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum InfoValue {
    /// bool values
    Bool(bool),
    /// Integer values within the safe-integer range.
    I64(i64),
    /// Floating point values, including out-of-range integers.
    F64(f64),
    /// UTF-8 text without embedded NUL bytes.
    Str(String),
    /// Binary blobs.
    Bytes(Vec<u8>),
}

impl From<bool> for InfoValue {
    fn from(value: bool) -> Self {
        InfoValue::Bool(value)
    }
}

impl From<i64> for InfoValue {
    fn from(value: i64) -> Self {
        if value > MAX_SAFE_INTEGER || value < -MAX_SAFE_INTEGER {
            InfoValue::F64(value as f64)
        } else {
            InfoValue::I64(value)
        }
    }
}

impl From<f64> for InfoValue {
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER as f64 {
            InfoValue::I64(value as i64)
        } else {
            InfoValue::F64(value)
        }
    }
}

impl From<&str> for InfoValue {
    fn from(value: &str) -> Self {
        if value.contains('\0') {
            InfoValue::Bytes(value.as_bytes().to_vec())
        } else {
            InfoValue::Str(value.to_owned())
        }
    }
}

impl From<String> for InfoValue {
    fn from(value: String) -> Self {
        if value.contains('\0') {
            InfoValue::Bytes(value.into_bytes())
        } else {
            InfoValue::Str(value)
        }
    }
}

impl From<&[u8]> for InfoValue {
    fn from(value: &[u8]) -> Self {
        InfoValue::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for InfoValue {
    fn from(value: Vec<u8>) -> Self {
        InfoValue::Bytes(value)
    }
}

/// A source an event can be derived from.
///
/// This is the fixed variant set standing in for the dynamic
/// "is this a context or an event" checks of object-wrapping runtimes.
#[derive(Clone, Copy, Debug)]
pub enum ContextSource<'a> {
    /// Derive from a bare trace context.
    Context(&'a TraceContext),
    /// Derive from an existing event's context.
    Event(&'a Event),
}

impl<'a> ContextSource<'a> {
    fn context(&self) -> &'a TraceContext {
        match *self {
            ContextSource::Context(ctx) => ctx,
            ContextSource::Event(event) => event.context(),
        }
    }
}

impl<'a> From<&'a TraceContext> for ContextSource<'a> {
    fn from(ctx: &'a TraceContext) -> Self {
        ContextSource::Context(ctx)
    }
}

impl<'a> From<&'a Event> for ContextSource<'a> {
    fn from(event: &'a Event) -> Self {
        ContextSource::Event(event)
    }
}

/// One recorded point in the trace graph.
///
/// An event is either fully constructed or never observable: construction
/// failures surface as [`EventError`] before a usable value exists. The
/// object tracks no "sent" state; handing it to a report channel is the
/// caller's one-shot action and retries belong to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    context: TraceContext,
    parent_op_ids: Vec<OpId>,
    info: Vec<(String, InfoValue)>,
}

impl Event {
    /// The context owned by this event.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Op ids of the events this one was derived from, in insertion order.
    ///
    /// Empty when the event was created without an edge. More than one
    /// entry models fan-in, e.g. batched or joined operations.
    pub fn parent_op_ids(&self) -> &[OpId] {
        &self.parent_op_ids
    }

    /// The typed key-value attachments, in insertion order.
    ///
    /// Duplicate keys are permitted and all entries are retained.
    pub fn info(&self) -> &[(String, InfoValue)] {
        &self.info
    }

    /// Append an additional causal parent beyond the one set at
    /// construction.
    ///
    /// Fails if `other` has no usable op id; the event is left unchanged on
    /// failure.
    pub fn add_edge<'a>(&mut self, other: impl Into<ContextSource<'a>>) -> Result<(), EventError> {
        let ctx = other.into().context().clone();
        if !ctx.is_valid() {
            return Err(EventError::MissingEdgeSource);
        }
        self.parent_op_ids.push(ctx.op_id());
        Ok(())
    }

    /// Append a causal parent given its canonical string form.
    pub fn add_edge_str(&mut self, other: &str) -> Result<(), EventError> {
        let ctx = TraceContext::decode(other)?;
        self.add_edge(&ctx)
    }

    /// Append a typed key-value attachment.
    ///
    /// Classification (integer vs. float, text vs. binary) happens in
    /// [`InfoValue`]'s conversions. Previously attached entries are never
    /// disturbed.
    pub fn add_info(&mut self, key: impl Into<String>, value: impl Into<InfoValue>) {
        self.info.push((key.into(), value.into()));
    }

    /// Encode this event's context in the given style.
    pub fn format(&self, style: Format) -> String {
        self.context.encode(style)
    }

    /// Returns `true` if the context's `sampled` flag is set.
    pub fn is_sampled(&self) -> bool {
        self.context.is_sampled()
    }

    /// Set the context's `sampled` flag, returning its previous value.
    pub fn set_sampled(&mut self, sampled: bool) -> bool {
        self.context.set_sampled(sampled)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.context, f)
    }
}

/// Counters describing what a builder has produced so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct EventStats {
    /// Events successfully constructed by this builder.
    pub created: u64,
}

/// Constructs [`Event`]s from trace contexts.
///
/// The builder owns the [`IdGenerator`] used to mint op ids, so event
/// counting and identity stay with an explicit collaborator instead of
/// process-wide mutable state.
#[derive(Debug)]
pub struct EventBuilder {
    id_generator: Box<dyn IdGenerator>,
    created: AtomicU64,
}

impl Default for EventBuilder {
    fn default() -> Self {
        EventBuilder::new(Box::<RandomIdGenerator>::default())
    }
}

impl EventBuilder {
    /// Create a builder minting ids from the given generator.
    pub fn new(id_generator: Box<dyn IdGenerator>) -> Self {
        EventBuilder {
            id_generator,
            created: AtomicU64::new(0),
        }
    }

    /// Create an event derived from `source`, adding an edge back to the
    /// source's op id.
    ///
    /// Edging back is the default because a derived event is causally
    /// downstream of its source in all but fan-out bookkeeping cases; use
    /// [`event_from`](Self::event_from) with `add_edge = false` for those.
    pub fn event<'a>(&self, source: impl Into<ContextSource<'a>>) -> Result<Event, EventError> {
        self.event_from(source, true)
    }

    /// Create an event derived from `source`.
    ///
    /// The new event copies the source context's task id and flags and
    /// receives a fresh random op id. When `add_edge` is true the source's
    /// op id is recorded as the event's parent; this fails with
    /// [`EventError::MissingEdgeSource`] if the source op id is invalid,
    /// and no partially constructed event is observable.
    pub fn event_from<'a>(
        &self,
        source: impl Into<ContextSource<'a>>,
        add_edge: bool,
    ) -> Result<Event, EventError> {
        let source = source.into().context();
        if add_edge && !source.is_valid() {
            return Err(EventError::MissingEdgeSource);
        }

        let context = source.with_new_op_id(self.id_generator.as_ref());
        let parent_op_ids = if add_edge {
            vec![source.op_id()]
        } else {
            Vec::new()
        };

        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Event {
            context,
            parent_op_ids,
            info: Vec::new(),
        })
    }

    /// Create an event from a canonical context string.
    ///
    /// Decode failures propagate as [`EventError::InvalidSource`].
    pub fn event_from_str(&self, encoded: &str, add_edge: bool) -> Result<Event, EventError> {
        let context = TraceContext::decode(encoded)?;
        self.event_from(&context, add_edge)
    }

    /// Derive a fresh root context from this builder's id generator.
    pub fn new_context(&self, sampled: bool) -> TraceContext {
        TraceContext::new(sampled, self.id_generator.as_ref())
    }

    /// Counters describing what this builder has produced.
    pub fn stats(&self) -> EventStats {
        EventStats {
            created: self.created.load(Ordering::Relaxed),
        }
    }
}
