use burn_cubecl::{CubeRuntime, FloatElement, IntElement, tensor::CubeTensor};
use cubecl::prelude::*;
use tracing::trace;

use super::kernel::{RENORM_UNITS, renorm_kernel};
use crate::{
    EmbeddingError,
    kernels::{
        bundle::tensor_bundle,
        kernel::SparseKernel,
        precision::{Accumulator, with_accumulator},
        util::{check_bundle, check_float_dtype, check_index_dtype, spread_cubes},
    },
};

tensor_bundle! {
    /// Inputs of the renormalization kernel.
    pub struct RenormInputs[2] { weight, sorted_indices }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenormParams {
    pub max_norm: f64,
    pub norm_type: f64,
}

/// Marker type for the row renormalization kernel.
#[derive(Debug, Clone, Copy)]
pub struct RenormKernel;

impl SparseKernel<2> for RenormKernel {
    type Inputs<T: std::fmt::Debug + Clone + Send> = RenormInputs<T>;
    type Config = RenormParams;

    const NAME: &'static str = "renorm";

    /// Rescales `weight` in place and hands the same tensor back.
    fn launch<R: CubeRuntime, F: FloatElement, I: IntElement>(
        inputs: RenormInputs<CubeTensor<R>>,
        params: RenormParams,
    ) -> Result<CubeTensor<R>, EmbeddingError> {
        check_bundle::<R, _, 2>(&inputs)?;
        check_index_dtype::<R, I>("sorted_indices", &inputs.sorted_indices)?;
        check_float_dtype::<R, F>(&inputs.weight)?;
        let accumulator = Accumulator::for_storage(inputs.weight.dtype)?;

        let num_indices = inputs.sorted_indices.shape.dims[0];
        if num_indices == 0 {
            return Ok(inputs.weight);
        }

        let (cubes_x, cubes_z) = spread_cubes(num_indices);
        trace!(
            num_indices,
            stride = inputs.weight.shape.dims[1],
            cubes_x,
            cubes_z,
            ?params,
            "launching renorm"
        );

        with_accumulator!(accumulator, |A| {
            renorm_kernel::launch::<F, A, I, R>(
                &inputs.weight.client,
                CubeCount::Static(cubes_x, 1, cubes_z),
                CubeDim::new_1d(RENORM_UNITS as u32),
                inputs.weight.as_tensor_arg(1),
                inputs.sorted_indices.as_tensor_arg(1),
                ScalarArg::new(params.max_norm as A),
                ScalarArg::new(params.norm_type as A),
            )
        })
        .map_err(|err| EmbeddingError::launch(Self::NAME, err))?;

        Ok(inputs.weight)
    }
}
