//! The destroy contract every cached payload implements.

use proedit_core::Result;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cached payload that may own external handles (GPU textures, decoder
/// processes, file mappings).
///
/// The cache calls [`Resource::destroy`] exactly once when it evicts or
/// clears an entry. Implementations must still tolerate repeated calls, and
/// a call on a partially constructed value, because consumers may hold the
/// payload past eviction and release it themselves.
pub trait Resource: Send + Sync + 'static {
    /// Release every external handle this payload owns.
    fn destroy(&self) -> Result<()>;

    /// Approximate memory held by the payload, for logging and statistics.
    fn memory_size(&self) -> usize {
        0
    }
}

/// One-shot flag that makes `destroy` implementations idempotent.
#[derive(Debug, Default)]
pub struct DestroyFlag(AtomicBool);

impl DestroyFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns `true` exactly once: for the first caller.
    pub fn mark(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
