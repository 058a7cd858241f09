//! Per-member mutation generations.
//!
//! Every incremental mutation and invalidation bumps the member's generation
//! before it touches the store, whether or not a namespace exists. A rebuild
//! samples the generation before querying the source of truth and checks it
//! again after writing; a change means some mutation raced the source read,
//! so the freshly written namespace cannot be trusted and is dropped.
//!
//! Members share a fixed number of striped counters. A collision only makes
//! a rebuild discard its namespace more often than strictly needed.

use std::sync::atomic::{AtomicU64, Ordering};

use chime_core::MemberId;

const STRIPES: usize = 256;

/// Striped generation counters keyed by member.
#[derive(Debug)]
pub struct MutationGenerations {
    stripes: Box<[AtomicU64]>,
}

impl Default for MutationGenerations {
    fn default() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

impl MutationGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    fn stripe(&self, member_id: MemberId) -> &AtomicU64 {
        let index = (member_id.get() as u64 % STRIPES as u64) as usize;
        &self.stripes[index]
    }

    /// Current generation of a member.
    pub fn current(&self, member_id: MemberId) -> u64 {
        self.stripe(member_id).load(Ordering::SeqCst)
    }

    /// Record a mutation for a member, returning the new generation.
    pub fn bump(&self, member_id: MemberId) -> u64 {
        self.stripe(member_id).fetch_add(1, Ordering::SeqCst) + 1
    }
}
