//! Large-batch accumulation path over value-sorted indices, plus the
//! run-length counter that feeds it frequency counts.

mod kernel;
mod launch;

pub use kernel::{FEATURES_PER_CUBE, ROWS_PER_CUBE, RUN_UNITS, TILE};
pub use launch::{
    RunLengthInputs, RunLengthKernel, SortedAccumulateKernel, SortedInputs, SortedParams,
    launch_sorted_accumulate,
};
