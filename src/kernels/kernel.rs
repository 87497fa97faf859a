use std::fmt::Debug;

use burn_cubecl::{CubeRuntime, FloatElement, IntElement, tensor::CubeTensor};

use super::bundle::TensorBundle;
use crate::EmbeddingError;

/// Trait for defining the CubeCL kernels behind the embedding backward pass.
///
/// `N` is the number of tensors the kernel consumes. Float and integer tensors
/// share the `CubeTensor` representation, so a single bundle carries both.
/// Every kernel produces exactly one tensor.
pub trait SparseKernel<const N: usize>: 'static + Send + Debug + Clone {
    type Inputs<T: Debug + Clone + Send>: TensorBundle<T, N>;
    type Config: Debug + Clone + Send;

    /// Name reported in launch traces and launch errors.
    const NAME: &'static str;

    fn launch<R: CubeRuntime, F: FloatElement, I: IntElement>(
        inputs: Self::Inputs<CubeTensor<R>>,
        config: Self::Config,
    ) -> Result<CubeTensor<R>, EmbeddingError>;
}
