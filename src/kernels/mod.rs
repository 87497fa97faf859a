//! CubeCL kernels behind the embedding backward pass and their backend plumbing.

#![allow(clippy::too_many_arguments)]
#![allow(
    clippy::trivially_copy_pass_by_ref,
    reason = "erroneous false positives on #[cube] functions"
)]
#![allow(non_snake_case)]

pub mod backend;
pub mod bundle;
pub mod direct;
mod impls;
pub mod kernel;
pub mod precision;
pub mod renorm;
pub mod sorted;
pub mod util;

pub use backend::EmbeddingBackwardBackend;
pub use bundle::TensorBundle;
pub use kernel::SparseKernel;
pub use precision::Accumulator;
