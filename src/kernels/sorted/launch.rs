use burn_cubecl::{CubeRuntime, FloatElement, IntElement, tensor::CubeTensor};
use cubecl::prelude::*;
use tracing::trace;

use super::kernel::{
    FEATURES_PER_CUBE, LANES, ROWS_PER_CUBE, RUN_UNITS, run_length_kernel,
    sorted_accumulate_kernel,
};
use crate::{
    EmbeddingError,
    kernels::{
        bundle::tensor_bundle,
        kernel::SparseKernel,
        precision::{Accumulator, with_accumulator},
        util::{
            check_bundle, check_float_dtype, check_index_dtype, empty_like, padding_row,
            spread_cubes,
        },
    },
};

tensor_bundle! {
    /// Inputs of the sort-grouped accumulation kernel.
    ///
    /// `counts` is only read when frequency scaling is on; any index-typed
    /// tensor of matching length may stand in for it otherwise.
    pub struct SortedInputs[5] { sorted_indices, permutation, counts, grad, grad_weight }
}

tensor_bundle! {
    /// Input of the run-length kernel.
    pub struct RunLengthInputs[1] { sorted_indices }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortedParams {
    pub padding_idx: Option<usize>,
    pub scale_by_frequency: bool,
}

/// Marker type for the sort-grouped accumulation kernel.
#[derive(Debug, Clone, Copy)]
pub struct SortedAccumulateKernel;

impl SparseKernel<5> for SortedAccumulateKernel {
    type Inputs<T: std::fmt::Debug + Clone + Send> = SortedInputs<T>;
    type Config = SortedParams;

    const NAME: &'static str = "sorted_accumulate";

    fn launch<R: CubeRuntime, F: FloatElement, I: IntElement>(
        inputs: SortedInputs<CubeTensor<R>>,
        params: SortedParams,
    ) -> Result<CubeTensor<R>, EmbeddingError> {
        check_bundle::<R, _, 5>(&inputs)?;
        check_index_dtype::<R, I>("sorted_indices", &inputs.sorted_indices)?;
        check_index_dtype::<R, I>("permutation", &inputs.permutation)?;
        check_index_dtype::<R, I>("counts", &inputs.counts)?;
        check_float_dtype::<R, F>(&inputs.grad)?;
        check_float_dtype::<R, F>(&inputs.grad_weight)?;
        let accumulator = Accumulator::for_storage(inputs.grad.dtype)?;

        launch_sorted_accumulate::<R, F, I>(
            &inputs.grad.client,
            inputs.sorted_indices.as_handle_ref(),
            inputs.permutation.as_handle_ref(),
            inputs.counts.as_handle_ref(),
            inputs.grad.as_handle_ref(),
            inputs.grad_weight.as_handle_ref(),
            params,
            accumulator,
        )?;

        Ok(inputs.grad_weight)
    }
}

/// Launch the sort-grouped accumulation kernel.
pub fn launch_sorted_accumulate<R: CubeRuntime, F: FloatElement, I: IntElement>(
    client: &ComputeClient<R>,
    sorted_indices: TensorHandleRef<R>,
    permutation: TensorHandleRef<R>,
    counts: TensorHandleRef<R>,
    grad: TensorHandleRef<R>,
    grad_weight: TensorHandleRef<R>,
    params: SortedParams,
    accumulator: Accumulator,
) -> Result<(), EmbeddingError> {
    let num_indices = sorted_indices.shape[0];
    let stride = grad_weight.shape[1];

    let (blocks_x, blocks_z) = spread_cubes(num_indices.div_ceil(ROWS_PER_CUBE));
    let feature_tiles = stride.div_ceil(FEATURES_PER_CUBE) as u32;

    let cube_count = CubeCount::Static(blocks_x, feature_tiles, blocks_z);
    let cube_dim = CubeDim::new_2d(LANES as u32, ROWS_PER_CUBE as u32);

    trace!(
        num_indices,
        stride,
        blocks_x,
        blocks_z,
        feature_tiles,
        scale_by_frequency = params.scale_by_frequency,
        "launching sort-grouped accumulation"
    );

    with_accumulator!(accumulator, |A| {
        sorted_accumulate_kernel::launch::<F, A, I, R>(
            client,
            cube_count,
            cube_dim,
            sorted_indices.as_tensor_arg(1),
            permutation.as_tensor_arg(1),
            counts.as_tensor_arg(1),
            grad.as_tensor_arg(1),
            grad_weight.as_tensor_arg(1),
            ScalarArg::new(padding_row(params.padding_idx)),
            params.scale_by_frequency,
        )
    })
    .map_err(|err| EmbeddingError::launch(SortedAccumulateKernel::NAME, err))
}

/// Marker type for the run-length (frequency count) kernel.
#[derive(Debug, Clone, Copy)]
pub struct RunLengthKernel;

impl SparseKernel<1> for RunLengthKernel {
    type Inputs<T: std::fmt::Debug + Clone + Send> = RunLengthInputs<T>;
    type Config = ();

    const NAME: &'static str = "run_length";

    fn launch<R: CubeRuntime, F: FloatElement, I: IntElement>(
        inputs: RunLengthInputs<CubeTensor<R>>,
        _config: (),
    ) -> Result<CubeTensor<R>, EmbeddingError> {
        check_bundle::<R, _, 1>(&inputs)?;
        check_index_dtype::<R, I>("sorted_indices", &inputs.sorted_indices)?;

        let sorted_indices = inputs.sorted_indices;
        let num_indices = sorted_indices.shape.dims[0];
        let counts = empty_like::<R, I>(&sorted_indices, [num_indices]);

        if num_indices == 0 {
            return Ok(counts);
        }

        let (blocks_x, blocks_z) = spread_cubes(num_indices.div_ceil(RUN_UNITS));
        trace!(num_indices, blocks_x, blocks_z, "launching run-length count");

        run_length_kernel::launch::<I, R>(
            &sorted_indices.client,
            CubeCount::Static(blocks_x, 1, blocks_z),
            CubeDim::new_1d(RUN_UNITS as u32),
            sorted_indices.as_tensor_arg(1),
            counts.as_tensor_arg(1),
        )
        .map_err(|err| EmbeddingError::launch(Self::NAME, err))?;

        Ok(counts)
    }
}
