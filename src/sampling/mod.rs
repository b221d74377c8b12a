//! Sampling decisions under rate constraints.
//!
//! The [`SamplingGate`] combines a statistical sample-rate draw with a
//! token-bucket rate limiter. A decision distinguishes "statistically
//! selected but throttled" from "never selected" so sampling behavior stays
//! observable.

mod token_bucket;

use std::sync::{Condvar, Mutex};
use std::time::{Duration, SystemTime};

use rand::Rng;

use crate::config::{ConfigReport, GateConfig};
use crate::id_generator::CURRENT_RNG;
use token_bucket::TokenBucket;

/// Denominator of the sample-rate fraction; a rate of `MAX_SAMPLE_RATE`
/// means "always sample".
pub const MAX_SAMPLE_RATE: u32 = 1_000_000;

const DEFAULT_BUCKET_CAPACITY: f64 = 16.0;
const DEFAULT_BUCKET_RATE: f64 = 8.0;
const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_millis(2000);

/// Outcome of a single sampling decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    /// The event should be recorded.
    pub sampled: bool,
    /// The event was statistically selected but the token bucket was empty.
    pub rate_limited: bool,
}

/// Readiness of the gate and its upstream sampling-settings source.
///
/// The discriminants are the wire status codes reported by the collector
/// handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ReadinessStatus {
    /// No readiness signal has been received yet.
    Unknown = 0,
    /// Ready to issue decisions.
    Ok = 1,
    /// The settings source is temporarily unavailable.
    TryLater = 2,
    /// The settings source rejected the agent for exceeding its limits.
    LimitExceeded = 3,
    /// The configured credential was rejected.
    InvalidCredential = 4,
    /// The settings source could not be reached.
    ConnectError = 5,
}

#[derive(Debug)]
struct GateState {
    capacity: f64,
    rate: f64,
    sample_rate: u32,
    bucket: TokenBucket,
}

/// Process-wide sampling state: token bucket plus sample rate.
///
/// All mutation happens under a single mutex so concurrent callers never
/// observe a half-updated bucket. [`configure`](SamplingGate::configure)
/// replaces the state in one step; no decision sees a mix of old capacity
/// and new rate.
#[derive(Debug)]
pub struct SamplingGate {
    state: Mutex<Option<GateState>>,
    readiness: Mutex<ReadinessStatus>,
    readiness_signal: Condvar,
    readiness_timeout: Mutex<Duration>,
}

impl Default for SamplingGate {
    fn default() -> Self {
        SamplingGate::new()
    }
}

impl SamplingGate {
    /// Create an unconfigured gate.
    ///
    /// [`configure`](Self::configure) or
    /// [`apply_config`](Self::apply_config) must be called before the first
    /// [`decide`](Self::decide).
    pub fn new() -> Self {
        SamplingGate {
            state: Mutex::new(None),
            readiness: Mutex::new(ReadinessStatus::Unknown),
            readiness_signal: Condvar::new(),
            readiness_timeout: Mutex::new(DEFAULT_READINESS_TIMEOUT),
        }
    }

    /// Set token-bucket capacity, refill rate (tokens/second), and the
    /// sample rate out of [`MAX_SAMPLE_RATE`].
    ///
    /// Replaces any previous state atomically.
    pub fn configure(&self, capacity: f64, rate: f64, sample_rate: u32) {
        let mut state = self.state.lock().expect("sampling state lock poisoned");
        *state = Some(GateState {
            capacity,
            rate,
            sample_rate: sample_rate.min(MAX_SAMPLE_RATE),
            bucket: TokenBucket::new(capacity, rate),
        });
        tracing::debug!(
            name: "SamplingGate.Configured",
            capacity,
            rate,
            sample_rate,
            "sampling state replaced"
        );
    }

    /// Apply the recognized fields of `config`, reporting which fields were
    /// processed and which were applied.
    ///
    /// Out-of-range values are processed but ignored, never fatal. Fields
    /// not present keep their current (or default) values, and the token
    /// bucket's current level carries over (clamped to the new capacity) —
    /// a settings refresh never refills the bucket. The read-modify-write
    /// happens under one lock acquisition, so concurrent applications
    /// cannot drop each other's fields.
    pub fn apply_config(&self, config: &GateConfig) -> ConfigReport {
        let mut report = ConfigReport::default();

        let mut guard = self.state.lock().expect("sampling state lock poisoned");
        let state = guard.get_or_insert_with(|| GateState {
            capacity: DEFAULT_BUCKET_CAPACITY,
            rate: DEFAULT_BUCKET_RATE,
            sample_rate: MAX_SAMPLE_RATE,
            bucket: TokenBucket::new(DEFAULT_BUCKET_CAPACITY, DEFAULT_BUCKET_RATE),
        });

        let mut bucket_changed = false;
        if let Some(value) = config.token_bucket_capacity {
            report.processed.push("token_bucket_capacity");
            if value.is_finite() && value >= 0.0 {
                report.applied.push("token_bucket_capacity");
                state.capacity = value;
                bucket_changed = true;
            }
        }
        if let Some(value) = config.token_bucket_rate {
            report.processed.push("token_bucket_rate");
            if value.is_finite() && value >= 0.0 {
                report.applied.push("token_bucket_rate");
                state.rate = value;
                bucket_changed = true;
            }
        }
        if let Some(value) = config.sample_rate {
            report.processed.push("sample_rate");
            if value <= MAX_SAMPLE_RATE {
                report.applied.push("sample_rate");
                state.sample_rate = value;
            }
        }
        if bucket_changed {
            state.bucket.reconfigure(state.capacity, state.rate);
        }
        drop(guard);

        if let Some(value) = config.readiness_timeout_ms {
            report.processed.push("readiness_timeout_ms");
            report.applied.push("readiness_timeout_ms");
            *self
                .readiness_timeout
                .lock()
                .expect("readiness timeout lock poisoned") = Duration::from_millis(value);
        }

        tracing::debug!(
            name: "SamplingGate.ConfigApplied",
            applied = report.applied.len(),
            "settings refresh applied"
        );
        report
    }

    /// Decide whether an event observed at `now` should be sampled.
    ///
    /// Statistical selection happens first; only a selected event withdraws
    /// a token. `sampled = false, rate_limited = true` means the event was
    /// eligible by rate but throttled.
    ///
    /// # Panics
    ///
    /// Panics if called before [`configure`](Self::configure); deciding
    /// against unset state would silently corrupt sampling statistics.
    pub fn decide(&self, now: SystemTime) -> Decision {
        let mut state = self.state.lock().expect("sampling state lock poisoned");
        let state = state
            .as_mut()
            .expect("SamplingGate::decide called before SamplingGate::configure");

        let selected = state.sample_rate >= MAX_SAMPLE_RATE
            || CURRENT_RNG.with(|rng| rng.borrow_mut().gen_range(0..MAX_SAMPLE_RATE))
                < state.sample_rate;
        if !selected {
            return Decision {
                sampled: false,
                rate_limited: false,
            };
        }

        if state.bucket.try_consume(|| now) {
            Decision {
                sampled: true,
                rate_limited: false,
            }
        } else {
            Decision {
                sampled: false,
                rate_limited: true,
            }
        }
    }

    /// Record a readiness signal from the transport collaborator and wake
    /// any waiters.
    pub fn set_readiness(&self, status: ReadinessStatus) {
        let mut readiness = self.readiness.lock().expect("readiness lock poisoned");
        *readiness = status;
        self.readiness_signal.notify_all();
    }

    /// Wait up to `timeout` for a definitive readiness signal.
    ///
    /// Returns the best-known status when the wait ends;
    /// [`ReadinessStatus::Unknown`] if nothing definitive arrived in time.
    /// Never blocks indefinitely and never errors, so callers can proceed
    /// in a degraded mode on timeout.
    pub fn is_ready(&self, timeout: Duration) -> ReadinessStatus {
        let readiness = self.readiness.lock().expect("readiness lock poisoned");
        let (readiness, _timed_out) = self
            .readiness_signal
            .wait_timeout_while(readiness, timeout, |status| {
                *status == ReadinessStatus::Unknown
            })
            .expect("readiness lock poisoned");
        *readiness
    }

    /// [`is_ready`](Self::is_ready) with the configured default timeout.
    pub fn is_ready_default(&self) -> ReadinessStatus {
        let timeout = *self
            .readiness_timeout
            .lock()
            .expect("readiness timeout lock poisoned");
        self.is_ready(timeout)
    }
}
