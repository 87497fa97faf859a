use burn_cubecl::{CubeRuntime, FloatElement, IntElement, tensor::CubeTensor};
use cubecl::prelude::*;
use tracing::trace;

use super::kernel::{LANES, SUB_GROUPS, direct_accumulate_kernel};
use crate::{
    EmbeddingError,
    kernels::{
        bundle::tensor_bundle,
        kernel::SparseKernel,
        precision::{Accumulator, with_accumulator},
        util::{check_bundle, check_float_dtype, check_index_dtype, padding_row},
    },
};

tensor_bundle! {
    /// Inputs of the direct accumulation kernel.
    pub struct DirectInputs[3] { grad, indices, grad_weight }
}

/// Launch parameters of the direct accumulation kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectParams {
    pub padding_idx: Option<usize>,
}

/// Marker type for the direct (lane-reduction) accumulation kernel.
#[derive(Debug, Clone, Copy)]
pub struct DirectAccumulateKernel;

impl SparseKernel<3> for DirectAccumulateKernel {
    type Inputs<T: std::fmt::Debug + Clone + Send> = DirectInputs<T>;
    type Config = DirectParams;

    const NAME: &'static str = "direct_accumulate";

    fn launch<R: CubeRuntime, F: FloatElement, I: IntElement>(
        inputs: DirectInputs<CubeTensor<R>>,
        params: DirectParams,
    ) -> Result<CubeTensor<R>, EmbeddingError> {
        check_bundle::<R, _, 3>(&inputs)?;
        check_index_dtype::<R, I>("indices", &inputs.indices)?;
        check_float_dtype::<R, F>(&inputs.grad)?;
        check_float_dtype::<R, F>(&inputs.grad_weight)?;
        let accumulator = Accumulator::for_storage(inputs.grad.dtype)?;

        launch_direct_accumulate::<R, F, I>(
            &inputs.grad.client,
            inputs.grad.as_handle_ref(),
            inputs.indices.as_handle_ref(),
            inputs.grad_weight.as_handle_ref(),
            padding_row(params.padding_idx),
            accumulator,
        )?;

        Ok(inputs.grad_weight)
    }
}

/// Launch the direct accumulation kernel.
///
/// One cube per `LANES`-wide feature tile; every cube walks the full batch.
pub fn launch_direct_accumulate<R: CubeRuntime, F: FloatElement, I: IntElement>(
    client: &ComputeClient<R>,
    grad: TensorHandleRef<R>,
    indices: TensorHandleRef<R>,
    grad_weight: TensorHandleRef<R>,
    padding_row: u32,
    accumulator: Accumulator,
) -> Result<(), EmbeddingError> {
    let stride = grad_weight.shape[1];
    let feature_tiles = stride.div_ceil(LANES) as u32;

    let cube_count = CubeCount::Static(feature_tiles, 1, 1);
    let cube_dim = CubeDim::new_2d(LANES as u32, SUB_GROUPS as u32);

    trace!(
        num_indices = indices.shape[0],
        stride, feature_tiles, ?accumulator, "launching direct accumulation"
    );

    with_accumulator!(accumulator, |A| {
        direct_accumulate_kernel::launch::<F, A, I, R>(
            client,
            cube_count,
            cube_dim,
            grad.as_tensor_arg(1),
            indices.as_tensor_arg(1),
            grad_weight.as_tensor_arg(1),
            ScalarArg::new(padding_row),
        )
    })
    .map_err(|err| EmbeddingError::launch(DirectAccumulateKernel::NAME, err))
}
