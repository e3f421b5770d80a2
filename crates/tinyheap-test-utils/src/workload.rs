//! Seeded operation streams.
//!
//! A [`Workload`] yields [`Op`]s drawn from a [`WorkloadProfile`] with a
//! ChaCha8 generator, so the same `(profile, seed)` pair always replays
//! the same stream on every platform.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// One heap operation.
///
/// `slot` values are raw draws; the consumer maps them onto whatever
/// allocations are live at that point (usually `slot % live.len()`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Alloc { size: usize },
    Free { slot: usize },
    Realloc { slot: usize, size: usize },
    Defrag,
}

/// Relative operation weights and request size range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkloadProfile {
    pub name: &'static str,
    /// Smallest request size, inclusive.
    pub min_size: usize,
    /// Largest request size, inclusive.
    pub max_size: usize,
    pub alloc_weight: u32,
    pub free_weight: u32,
    pub realloc_weight: u32,
    pub defrag_weight: u32,
}

impl WorkloadProfile {
    /// Many short-lived small objects, as in widget or message churn.
    pub const SMALL_OBJECTS: Self = Self {
        name: "small_objects",
        min_size: 1,
        max_size: 64,
        alloc_weight: 5,
        free_weight: 4,
        realloc_weight: 1,
        defrag_weight: 0,
    };

    /// Wide size range with frequent resizing.
    pub const MIXED: Self = Self {
        name: "mixed",
        min_size: 0,
        max_size: 512,
        alloc_weight: 4,
        free_weight: 3,
        realloc_weight: 3,
        defrag_weight: 1,
    };

    /// Alloc/free churn with rare defragmentation, to build up holes.
    pub const CHURN: Self = Self {
        name: "churn",
        min_size: 8,
        max_size: 256,
        alloc_weight: 1,
        free_weight: 1,
        realloc_weight: 0,
        defrag_weight: 0,
    };

    /// Every built-in profile.
    pub const ALL: [Self; 3] = [Self::SMALL_OBJECTS, Self::MIXED, Self::CHURN];

    fn total_weight(&self) -> u32 {
        self.alloc_weight + self.free_weight + self.realloc_weight + self.defrag_weight
    }
}

/// Infinite, deterministic stream of [`Op`]s.
pub struct Workload {
    rng: ChaCha8Rng,
    profile: WorkloadProfile,
}

impl Workload {
    /// # Panics
    ///
    /// Panics if the profile has all-zero weights or `min_size > max_size`.
    pub fn new(profile: WorkloadProfile, seed: u64) -> Self {
        assert!(profile.total_weight() > 0, "profile {} has no weights", profile.name);
        assert!(
            profile.min_size <= profile.max_size,
            "profile {} has an empty size range",
            profile.name
        );
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            profile,
        }
    }

    pub fn profile(&self) -> &WorkloadProfile {
        &self.profile
    }

    fn size(&mut self) -> usize {
        self.rng
            .random_range(self.profile.min_size..=self.profile.max_size)
    }
}

impl Iterator for Workload {
    type Item = Op;

    fn next(&mut self) -> Option<Op> {
        let p = self.profile;
        let mut pick = self.rng.random_range(0..p.total_weight());
        if pick < p.alloc_weight {
            return Some(Op::Alloc { size: self.size() });
        }
        pick -= p.alloc_weight;
        if pick < p.free_weight {
            return Some(Op::Free {
                slot: self.rng.random_range(0..usize::MAX),
            });
        }
        pick -= p.free_weight;
        if pick < p.realloc_weight {
            let slot = self.rng.random_range(0..usize::MAX);
            return Some(Op::Realloc {
                slot,
                size: self.size(),
            });
        }
        Some(Op::Defrag)
    }
}

/// Collect `len` ops from a fresh [`Workload`].
pub fn generate(profile: WorkloadProfile, seed: u64, len: usize) -> Vec<Op> {
    Workload::new(profile, seed).take(len).collect()
}
