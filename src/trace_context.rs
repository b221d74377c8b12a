//! Trace identity: task and op ids, flags, and the canonical encoding.

use std::fmt;
use std::fmt::Write as _;
use std::hash::Hash;
use std::ops::{BitAnd, BitOr, Not};

use crate::error::ContextError;
use crate::id_generator::IdGenerator;

/// Protocol version emitted and accepted by this engine.
pub const VERSION: u8 = 0x00;

/// Byte length of a [`TaskId`].
pub const TASK_ID_LEN: usize = 20;

/// Byte length of an [`OpId`].
pub const OP_ID_LEN: usize = 8;

/// Packed binary length: `version || task_id || op_id || flags`.
pub const PACKED_LEN: usize = 1 + TASK_ID_LEN + OP_ID_LEN + 1;

/// Length of the canonical hex encoding.
pub const ENCODED_LEN: usize = PACKED_LEN * 2;

/// Flags carried by a [`TraceContext`].
///
/// The current version of the protocol only defines a single flag,
/// [`TraceFlags::SAMPLED`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Copy, Hash)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// Trace flags with the `sampled` flag set to `0`.
    ///
    /// Events that are not sampled will be ignored by most reporting tools.
    pub const NOT_SAMPLED: TraceFlags = TraceFlags(0x00);

    /// Trace flags with the `sampled` flag set to `1`.
    pub const SAMPLED: TraceFlags = TraceFlags(0x01);

    /// Construct new trace flags.
    pub const fn new(flags: u8) -> Self {
        TraceFlags(flags)
    }

    /// Returns `true` if the `sampled` flag is set.
    pub fn is_sampled(&self) -> bool {
        (*self & TraceFlags::SAMPLED) == TraceFlags::SAMPLED
    }

    /// Returns a copy of the current flags with the `sampled` flag set as given.
    pub fn with_sampled(&self, sampled: bool) -> Self {
        if sampled {
            *self | TraceFlags::SAMPLED
        } else {
            *self & !TraceFlags::SAMPLED
        }
    }

    /// Returns the flags as a `u8`.
    pub fn to_u8(self) -> u8 {
        self.0
    }
}

impl BitAnd for TraceFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for TraceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl Not for TraceFlags {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl fmt::LowerHex for TraceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A 20-byte value identifying a whole trace.
///
/// Every event belonging to one logical trace carries the same task id.
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct TaskId([u8; TASK_ID_LEN]);

impl TaskId {
    /// Invalid (all-zero) task id.
    pub const INVALID: TaskId = TaskId([0; TASK_ID_LEN]);

    /// Create a task id from its representation as a byte array.
    pub const fn from_bytes(bytes: [u8; TASK_ID_LEN]) -> Self {
        TaskId(bytes)
    }

    /// Return the representation of this task id as a byte array.
    pub const fn to_bytes(self) -> [u8; TASK_ID_LEN] {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An 8-byte value identifying a single operation within a trace.
///
/// A fresh op id is generated for every derived event; op ids are never
/// reused within a trace.
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct OpId([u8; OP_ID_LEN]);

impl OpId {
    /// Invalid (all-zero) op id.
    pub const INVALID: OpId = OpId([0; OP_ID_LEN]);

    /// Create an op id from its representation as a byte array.
    pub const fn from_bytes(bytes: [u8; OP_ID_LEN]) -> Self {
        OpId(bytes)
    }

    /// Return the representation of this op id as a byte array.
    pub const fn to_bytes(self) -> [u8; OP_ID_LEN] {
        self.0
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Encoding style for [`TraceContext::encode`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Contiguous uppercase hex, the wire form accepted by [`TraceContext::decode`].
    #[default]
    Canonical,
    /// Lowercase hex with `-` between fields, for operator inspection only.
    Human,
}

/// The identity attached to a unit of traced work.
///
/// A context packs a protocol version, a trace-wide [`TaskId`], a
/// per-operation [`OpId`] and [`TraceFlags`]. The canonical string form is
/// the hex encoding of `version || task_id || op_id || flags`.
///
/// Contexts are plain owned values; sharing one across threads while calling
/// [`set_sampled`](TraceContext::set_sampled) requires external
/// synchronization by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceContext {
    version: u8,
    task_id: TaskId,
    op_id: OpId,
    flags: TraceFlags,
}

impl TraceContext {
    /// Build a fresh context with random task and op ids.
    ///
    /// `sampled` seeds the flags from the prevailing process sampling
    /// default.
    pub fn new(sampled: bool, id_generator: &dyn IdGenerator) -> Self {
        TraceContext {
            version: VERSION,
            task_id: id_generator.new_task_id(),
            op_id: id_generator.new_op_id(),
            flags: TraceFlags::default().with_sampled(sampled),
        }
    }

    /// Construct a context from its parts.
    pub fn from_parts(task_id: TaskId, op_id: OpId, flags: TraceFlags) -> Self {
        TraceContext {
            version: VERSION,
            task_id,
            op_id,
            flags,
        }
    }

    /// Copy this context's task id and flags, generating a new random op id.
    ///
    /// This is how task identity propagates to derived events while
    /// operation identity does not.
    pub fn with_new_op_id(&self, id_generator: &dyn IdGenerator) -> Self {
        TraceContext {
            version: self.version,
            task_id: self.task_id,
            op_id: id_generator.new_op_id(),
            flags: self.flags,
        }
    }

    /// Unpack a context from its binary form.
    ///
    /// The input length is validated before any byte is copied, so a
    /// malformed blob can never read past the fixed-size id buffers.
    pub fn unpack(bytes: &[u8]) -> Result<Self, ContextError> {
        if bytes.len() != PACKED_LEN {
            return Err(ContextError::InvalidLength {
                expected: PACKED_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] != VERSION {
            return Err(ContextError::UnsupportedVersion(bytes[0]));
        }

        let mut task_id = [0u8; TASK_ID_LEN];
        task_id.copy_from_slice(&bytes[1..1 + TASK_ID_LEN]);
        let mut op_id = [0u8; OP_ID_LEN];
        op_id.copy_from_slice(&bytes[1 + TASK_ID_LEN..1 + TASK_ID_LEN + OP_ID_LEN]);

        Ok(TraceContext {
            version: bytes[0],
            task_id: TaskId(task_id),
            op_id: OpId(op_id),
            flags: TraceFlags::new(bytes[PACKED_LEN - 1]),
        })
    }

    /// Pack the context into its binary form.
    pub fn pack(&self) -> [u8; PACKED_LEN] {
        let mut out = [0u8; PACKED_LEN];
        out[0] = self.version;
        out[1..1 + TASK_ID_LEN].copy_from_slice(&self.task_id.0);
        out[1 + TASK_ID_LEN..1 + TASK_ID_LEN + OP_ID_LEN].copy_from_slice(&self.op_id.0);
        out[PACKED_LEN - 1] = self.flags.to_u8();
        out
    }

    /// Decode a context from its canonical hex form.
    ///
    /// Accepts upper or lower case; rejects any input whose hex-digit count
    /// differs from [`ENCODED_LEN`], any non-hex character, and any version
    /// byte other than [`VERSION`].
    pub fn decode(s: &str) -> Result<Self, ContextError> {
        if s.len() != ENCODED_LEN {
            tracing::debug!(
                name: "TraceContext.Decode.InvalidLength",
                length = s.len(),
                "rejecting trace context string"
            );
            return Err(ContextError::InvalidLength {
                expected: ENCODED_LEN,
                actual: s.len(),
            });
        }

        let mut bytes = [0u8; PACKED_LEN];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let hi = hex_value(chunk[0]).ok_or(ContextError::InvalidHex)?;
            let lo = hex_value(chunk[1]).ok_or(ContextError::InvalidHex)?;
            bytes[i] = (hi << 4) | lo;
        }

        Self::unpack(&bytes)
    }

    /// Encode the context in the given style.
    ///
    /// Both styles are pure functions of the byte content; only
    /// [`Format::Canonical`] round-trips through [`decode`](Self::decode).
    pub fn encode(&self, style: Format) -> String {
        let bytes = self.pack();
        match style {
            Format::Canonical => {
                let mut out = String::with_capacity(ENCODED_LEN);
                for byte in bytes {
                    let _ = write!(out, "{:02X}", byte);
                }
                out
            }
            Format::Human => {
                // version-taskId-opId-flags, lowercase.
                format!(
                    "{:02x}-{}-{}-{:02x}",
                    self.version,
                    self.task_id,
                    self.op_id,
                    self.flags.to_u8()
                )
            }
        }
    }

    /// The protocol version of this context.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// The [`TaskId`] shared by every event of this trace.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// The [`OpId`] of the current operation.
    pub fn op_id(&self) -> OpId {
        self.op_id
    }

    /// The flags carried by this context.
    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    /// Returns `true` if this context has a usable (non-zero) op id.
    pub fn is_valid(&self) -> bool {
        self.op_id != OpId::INVALID
    }

    /// Returns `true` if the `sampled` flag is set.
    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    /// Set the `sampled` flag, returning its previous value.
    ///
    /// Returning the prior value lets callers detect a flag flip.
    pub fn set_sampled(&mut self, sampled: bool) -> bool {
        let previous = self.flags.is_sampled();
        self.flags = self.flags.with_sampled(sampled);
        previous
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(Format::Canonical))
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_generator::{IncrementIdGenerator, RandomIdGenerator};

    fn sample_context() -> TraceContext {
        TraceContext::from_parts(
            TaskId::from_bytes([0x11; TASK_ID_LEN]),
            OpId::from_bytes([0x22; OP_ID_LEN]),
            TraceFlags::SAMPLED,
        )
    }

    #[test]
    fn canonical_round_trip() {
        let ctx = sample_context();
        let encoded = ctx.encode(Format::Canonical);
        assert_eq!(encoded.len(), ENCODED_LEN);
        assert_eq!(TraceContext::decode(&encoded).unwrap(), ctx);

        // decode ∘ encode is lossless modulo case.
        let lower = encoded.to_lowercase();
        let decoded = TraceContext::decode(&lower).unwrap();
        assert_eq!(decoded.encode(Format::Canonical), encoded);
    }

    #[test]
    fn decode_sampled_flag_scenario() {
        let s = format!("00{}{}01", "11".repeat(TASK_ID_LEN), "22".repeat(OP_ID_LEN));
        let mut ctx = TraceContext::decode(&s).unwrap();
        assert_eq!(ctx.flags().to_u8() & 1, 1);
        assert!(ctx.set_sampled(false));
        assert!(!ctx.is_sampled());
        assert!(!ctx.set_sampled(false));
    }

    #[test]
    fn decode_rejects_bad_length() {
        let err = TraceContext::decode("00ff").unwrap_err();
        assert_eq!(
            err,
            ContextError::InvalidLength {
                expected: ENCODED_LEN,
                actual: 4
            }
        );
    }

    #[test]
    fn decode_rejects_non_hex() {
        let s = "zz".repeat(PACKED_LEN);
        assert_eq!(
            TraceContext::decode(&s).unwrap_err(),
            ContextError::InvalidHex
        );
    }

    #[test]
    fn decode_rejects_version_mismatch() {
        let s = format!("2b{}{}01", "11".repeat(TASK_ID_LEN), "22".repeat(OP_ID_LEN));
        assert_eq!(
            TraceContext::decode(&s).unwrap_err(),
            ContextError::UnsupportedVersion(0x2b)
        );
    }

    #[test]
    fn unpack_rejects_short_blob() {
        let err = TraceContext::unpack(&[0u8; 4]).unwrap_err();
        assert_eq!(
            err,
            ContextError::InvalidLength {
                expected: PACKED_LEN,
                actual: 4
            }
        );
    }

    #[test]
    fn human_format_has_separators() {
        let ctx = sample_context();
        let human = ctx.encode(Format::Human);
        assert_eq!(human.split('-').count(), 4);
        assert_eq!(human, human.to_lowercase());
    }

    #[test]
    fn derivation_keeps_task_id_and_flags() {
        let generator = RandomIdGenerator::default();
        let ctx = TraceContext::new(true, &generator);
        let derived = ctx.with_new_op_id(&generator);
        assert_eq!(derived.task_id(), ctx.task_id());
        assert_eq!(derived.flags(), ctx.flags());
        assert_ne!(derived.op_id(), ctx.op_id());
    }

    #[test]
    fn increment_generator_is_predictable() {
        let generator = IncrementIdGenerator::new();
        let first = TraceContext::new(false, &generator);
        let second = first.with_new_op_id(&generator);
        assert_ne!(first.op_id(), second.op_id());
        assert!(!second.is_sampled());
    }
}
