//! Test utilities for tinyheap development.
//!
//! - [`workload`]: deterministic, seed-driven operation streams.
//! - [`shadow`]: a [`ShadowHeap`] that replays those streams against a
//!   real heap and checks its invariants after every step.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod shadow;
pub mod workload;

pub use shadow::{ShadowHeap, ShadowStats};
pub use workload::{Op, Workload, WorkloadProfile};
