//! Id generation for trace contexts.

use std::cell::RefCell;
use std::fmt;

use rand::{rngs, Rng, SeedableRng};

use crate::trace_context::{OpId, TaskId, OP_ID_LEN, TASK_ID_LEN};

/// Interface for generating trace ids.
///
/// Passed explicitly to the components that mint identity rather than read
/// from ambient global state, so tests can substitute a deterministic
/// implementation.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new `TaskId`.
    fn new_task_id(&self) -> TaskId;

    /// Generate a new `OpId`.
    fn new_op_id(&self) -> OpId;
}

/// Default [`IdGenerator`] implementation.
///
/// Generates task and op ids using a random number generator.
#[derive(Clone, Debug, Default)]
pub struct RandomIdGenerator {
    _private: (),
}

impl IdGenerator for RandomIdGenerator {
    fn new_task_id(&self) -> TaskId {
        CURRENT_RNG.with(|rng| TaskId::from_bytes(rng.borrow_mut().gen::<[u8; TASK_ID_LEN]>()))
    }

    fn new_op_id(&self) -> OpId {
        CURRENT_RNG.with(|rng| OpId::from_bytes(rng.borrow_mut().gen::<[u8; OP_ID_LEN]>()))
    }
}

thread_local! {
    /// Store random number generator for each thread
    pub(crate) static CURRENT_RNG: RefCell<rngs::SmallRng> =
        RefCell::new(rngs::SmallRng::from_entropy());
}

/// [`IdGenerator`] implementation that increments a counter for each new ID.
/// This helps produce predictable IDs for testing.
#[derive(Debug, Default)]
pub struct IncrementIdGenerator(std::sync::atomic::AtomicU64);

impl IncrementIdGenerator {
    /// Create a new [`IncrementIdGenerator`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for IncrementIdGenerator {
    fn new_task_id(&self) -> TaskId {
        let next = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        let mut bytes = [0u8; TASK_ID_LEN];
        bytes[TASK_ID_LEN - 8..].copy_from_slice(&next.to_be_bytes());
        TaskId::from_bytes(bytes)
    }

    fn new_op_id(&self) -> OpId {
        let next = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        OpId::from_bytes(next.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_distinct() {
        let generator = RandomIdGenerator::default();
        // Collisions are possible but at 2^-64 per pair not in this lifetime.
        assert_ne!(generator.new_op_id(), generator.new_op_id());
        assert_ne!(generator.new_task_id(), generator.new_task_id());
    }

    #[test]
    fn increment_ids_are_sequential() {
        let generator = IncrementIdGenerator::new();
        let first = generator.new_op_id();
        let second = generator.new_op_id();
        assert_eq!(first, OpId::from_bytes(1u64.to_be_bytes()));
        assert_eq!(second, OpId::from_bytes(2u64.to_be_bytes()));
    }
}
