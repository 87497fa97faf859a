//! Backward pass of a sparse embedding lookup on CubeCL backends.
//!
//! [`accumulate_gradient`] folds the upstream gradient into a dense
//! `[num_weights, stride]` table, merging repeated indices without atomics.
//! Small batches take a direct path that merges duplicates inside each cube;
//! larger ones, and every call with frequency scaling, sort the indices and let
//! the first position of each run own the row.
//!
//! [`renormalize_rows`] clips the p-norm of the rows a lookup touched, in place.

pub mod api;
pub mod config;
mod error;
pub mod kernels;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{
    accumulate_gradient, accumulate_gradient_batched, accumulate_gradient_with_config,
    renormalize_rows, renormalize_rows_with_config,
};
pub use config::{
    AccumulationStrategy, DEFAULT_DIRECT_THRESHOLD, EmbeddingGradConfig, GpuBackend, RenormConfig,
};
pub use error::EmbeddingError;
pub use kernels::EmbeddingBackwardBackend;
