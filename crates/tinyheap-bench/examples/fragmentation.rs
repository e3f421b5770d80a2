//! Fragmentation walk-through.
//!
//! Runs a churn workload, printing monitor snapshots before and after
//! defragmenting. Heap events are emitted through `tracing`; run with
//! `RUST_LOG=tinyheap=debug` (or `trace`) to see splits, relocations and
//! merges as they happen.

use tinyheap::{HeapStats, HEADER_SIZE};
use tinyheap_bench::{churn_profile, replay, BenchProfile};
use tinyheap_test_utils::WorkloadProfile;
use tracing_subscriber::EnvFilter;

fn print_stats(label: &str, s: &HeapStats) {
    println!(
        "  {label:<14} used={:>6}B free={:>6}B blocks={:>4}/{:<4} biggest_free={:>6}B used={:>3}% frag={:>3}%",
        s.used,
        s.free,
        s.used_blocks,
        s.free_blocks,
        s.largest_free,
        s.used_pct(),
        s.frag_pct(),
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== tinyheap fragmentation demo ===\n");

    let profiles = [
        churn_profile(),
        BenchProfile {
            capacity: 16 * 1024,
            workload: WorkloadProfile::MIXED,
            ops: 3_000,
        },
    ];

    for profile in profiles {
        println!("{} ({} ops, header {HEADER_SIZE}B)", profile.name(), profile.ops);
        let mut heap = profile.heap();
        let summary = replay(&mut heap, &profile.ops(7));
        tracing::info!(
            profile = %profile.name(),
            allocs = summary.allocs,
            out_of_memory = summary.out_of_memory,
            moves = summary.moves,
            peak_live = summary.peak_live,
            "workload finished"
        );

        let before = heap.report();
        print_stats("after churn", &before);
        let merged = heap.defragment();
        let after = heap.report();
        print_stats("defragmented", &after);
        println!("  merged {merged} headers\n");

        if let Err(e) = heap.verify() {
            eprintln!("heap failed verification: {e}");
            std::process::exit(1);
        }
    }
}
