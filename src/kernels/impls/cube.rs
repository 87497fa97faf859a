use burn::tensor::ops::{FloatTensor, IntTensor};
use burn_cubecl::{BoolElement, CubeBackend, CubeRuntime, FloatElement, IntElement};

use crate::{
    EmbeddingError,
    kernels::{
        backend::EmbeddingBackwardBackend,
        direct::{DirectAccumulateKernel, DirectInputs, DirectParams},
        kernel::SparseKernel,
        precision::Accumulator,
        renorm::{RenormInputs, RenormKernel, RenormParams},
        sorted::{
            RunLengthInputs, RunLengthKernel, SortedAccumulateKernel, SortedInputs, SortedParams,
        },
        util::{check_contiguous, check_float_dtype, check_index_dtype, ensure_same_device},
    },
};

impl<R, F, I, BT> EmbeddingBackwardBackend for CubeBackend<R, F, I, BT>
where
    R: CubeRuntime,
    F: FloatElement,
    I: IntElement,
    BT: BoolElement,
{
    fn embedding_validate(
        table_argument: &'static str,
        table: FloatTensor<Self>,
        indices: IntTensor<Self>,
    ) -> Result<(), EmbeddingError> {
        check_contiguous(table_argument, &table)?;
        check_contiguous("indices", &indices)?;
        ensure_same_device("indices", &indices.device, table_argument, &table.device)?;
        check_float_dtype::<R, F>(&table)?;
        check_index_dtype::<R, I>("indices", &indices)?;
        Accumulator::for_storage(table.dtype)?;
        Ok(())
    }

    fn embedding_grad_direct(
        grad: FloatTensor<Self>,
        indices: IntTensor<Self>,
        grad_weight: FloatTensor<Self>,
        padding_idx: Option<usize>,
    ) -> Result<FloatTensor<Self>, EmbeddingError> {
        DirectAccumulateKernel::launch::<R, F, I>(
            DirectInputs {
                grad,
                indices,
                grad_weight,
            },
            DirectParams { padding_idx },
        )
    }

    fn embedding_run_counts(
        sorted_indices: IntTensor<Self>,
    ) -> Result<IntTensor<Self>, EmbeddingError> {
        RunLengthKernel::launch::<R, F, I>(RunLengthInputs { sorted_indices }, ())
    }

    fn embedding_grad_sorted(
        grad: FloatTensor<Self>,
        sorted_indices: IntTensor<Self>,
        permutation: IntTensor<Self>,
        counts: Option<IntTensor<Self>>,
        grad_weight: FloatTensor<Self>,
        padding_idx: Option<usize>,
    ) -> Result<FloatTensor<Self>, EmbeddingError> {
        let scale_by_frequency = counts.is_some();
        // The kernel only reads `counts` when scaling.
        let counts = counts.unwrap_or_else(|| sorted_indices.clone());

        SortedAccumulateKernel::launch::<R, F, I>(
            SortedInputs {
                sorted_indices,
                permutation,
                counts,
                grad,
                grad_weight,
            },
            SortedParams {
                padding_idx,
                scale_by_frequency,
            },
        )
    }

    fn embedding_renorm_sorted(
        weight: FloatTensor<Self>,
        sorted_indices: IntTensor<Self>,
        max_norm: f64,
        norm_type: f64,
    ) -> Result<FloatTensor<Self>, EmbeddingError> {
        RenormKernel::launch::<R, F, I>(
            RenormInputs {
                weight,
                sorted_indices,
            },
            RenormParams {
                max_norm,
                norm_type,
            },
        )
    }
}
