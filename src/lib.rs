//! # xtrace-core
//!
//! The trace-context and event-graph engine underlying a distributed-tracing
//! agent. This crate decides *what* constitutes a trace identity, *how*
//! events link into a causal graph, and *whether* an event is eligible to be
//! recorded under rate constraints; delivering the result to a collector is
//! the job of an external [`ReportChannel`] implementation.
//!
//! The pieces, leaves first:
//!
//! * [`TraceContext`] — fixed-size binary identity (version, task id, op id,
//!   flags) with a canonical hex encoding.
//! * [`EventBuilder`] / [`Event`] — derive new contexts, link events into a
//!   DAG via parent op ids, attach typed key-value data.
//! * [`SamplingGate`] — token-bucket rate limiting plus statistical sample
//!   rate, with readiness signalling for the upstream settings source.
//! * [`SpanInput`] / [`SpanRecord`] — bounded-length span summaries for
//!   metrics aggregation.
//!
//! ```
//! use std::time::SystemTime;
//! use xtrace_core::{EventBuilder, SamplingGate, MAX_SAMPLE_RATE};
//!
//! let gate = SamplingGate::new();
//! gate.configure(16.0, 8.0, MAX_SAMPLE_RATE);
//!
//! let builder = EventBuilder::default();
//! let mut ctx = builder.new_context(false);
//! let decision = gate.decide(SystemTime::now());
//! ctx.set_sampled(decision.sampled);
//!
//! let mut event = builder.event(&ctx)?;
//! event.add_info("Layer", "app");
//! # Ok::<(), xtrace_core::EventError>(())
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(test, deny(warnings))]

pub mod config;
pub mod error;
pub mod event;
pub mod id_generator;
pub mod report;
pub mod sampling;
pub mod span;
pub mod trace_context;

pub use config::{ConfigReport, GateConfig};
pub use error::{ContextError, EventError, SpanError};
pub use event::{ContextSource, Event, EventBuilder, EventStats, InfoValue};
pub use id_generator::{IdGenerator, IncrementIdGenerator, RandomIdGenerator};
pub use report::{ChannelKind, InMemoryReportChannel, ReportChannel, SpanChannel};
pub use sampling::{Decision, ReadinessStatus, SamplingGate, MAX_SAMPLE_RATE};
pub use span::{SpanInput, SpanRecord, TRANSACTION_NAME_MAX_LEN};
pub use trace_context::{
    Format, OpId, TaskId, TraceContext, TraceFlags, ENCODED_LEN, OP_ID_LEN, TASK_ID_LEN, VERSION,
};
