//! Fuzz target for two-peer session agreement
//!
//! Drives two real engines through a real coordinator with arbitrary call,
//! replay, clock and disconnect sequences, and checks them against the
//! reference model after every step.
//!
//! # Invariants
//!
//! - Operation results match the model
//! - Both peers hold identical ledgers
//! - At most one winner, and both peers name the same one
//! - Replays and duplicate deliveries change nothing observable
//! - NEVER panic on any operation sequence

#![no_main]

use arbitrary::Arbitrary;
use bingo_core::SessionConfig;
use bingo_harness::{FaultConfig, ModelTable, Operation, SimTable};
use bingo_proto::Number;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    size: u8,
    threshold: u8,
    shuffle: [u64; 2],
    duplicates: bool,
    ops: Vec<Operation>,
}

/// Fisher-Yates over `1..=size²` driven by a small LCG.
fn pool(size: usize, mut state: u64) -> Vec<Number> {
    let max = Number::try_from(size * size).unwrap_or(Number::MAX);
    let mut values: Vec<Number> = (1..=max).collect();
    for i in (1..values.len()).rev() {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        let j = (state >> 33) as usize % (i + 1);
        values.swap(i, j);
    }
    values
}

fuzz_target!(|input: Input| {
    let size = usize::from(input.size % 4) + 2;
    let threshold = usize::from(input.threshold) % (2 * size + 2) + 1;
    let config = SessionConfig::default()
        .with_grid_size(size)
        .with_win_threshold(threshold)
        .with_peer_timeout(None);
    let pools = [pool(size, input.shuffle[0]), pool(size, input.shuffle[1])];
    let faults = FaultConfig { duplicate_rate: if input.duplicates { 0.25 } else { 0.0 } };

    let Ok(table) = SimTable::new(input.seed, config, pools.clone()) else {
        panic!("valid configuration rejected");
    };
    let mut real = table.with_faults(faults);
    let Ok(first) = real.start() else {
        panic!("table failed to start");
    };
    let mut model = ModelTable::new(pools, size, threshold, first);

    for op in input.ops.iter().take(256) {
        let model_result = model.apply(op);
        let real_result = real.apply(op);
        assert_eq!(model_result, real_result, "divergence on {op:?}");

        let state = real.observable_state();
        assert_eq!(state, model.observable_state(), "state divergence after {op:?}");
        assert_eq!(state.seats[0].ledger, state.seats[1].ledger);
        if let (Some(a), Some(b)) = (state.seats[0].winner, state.seats[1].winner) {
            assert_eq!(a, b, "peers disagree on the winner");
        }
    }
});
