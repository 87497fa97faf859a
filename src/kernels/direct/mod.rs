//! Small-batch accumulation path.

mod kernel;
mod launch;

pub use kernel::{LANES, SUB_GROUPS, SUPER_CHUNK};
pub use launch::{DirectParams, DirectAccumulateKernel, DirectInputs, launch_direct_accumulate};

#[cfg(test)]
mod tests {
    use burn::tensor::{Tensor, TensorPrimitive};
    use test_case::test_case;

    use crate::{
        GpuBackend,
        kernels::EmbeddingBackwardBackend,
        test_utils::{
            TestDims, assert_data_close, index_tensor, random_grad, reference_grad_weight,
            repeating_indices, to_host,
        },
    };

    const RTOL: f32 = 1e-4;
    const ATOL: f32 = 1e-4;

    /// Runs the direct kernel on `grad`, returning the host result.
    fn run_direct(
        grad: Tensor<GpuBackend, 2>,
        indices: &[i64],
        dims: TestDims,
        padding_idx: Option<usize>,
    ) -> Vec<f32> {
        let device = grad.device();
        let grad_weight = Tensor::<GpuBackend, 2>::zeros([dims.num_weights, dims.stride], &device);
        let out = GpuBackend::embedding_grad_direct(
            grad.into_primitive().tensor(),
            index_tensor::<GpuBackend>(indices, &device).into_primitive(),
            grad_weight.into_primitive().tensor(),
            padding_idx,
        )
        .unwrap();
        to_host(Tensor::<GpuBackend, 2>::from_primitive(TensorPrimitive::Float(out)))
    }

    #[test_case(8, 3, 3 ; "single_sub_chunk")]
    #[test_case(16, 37, 40 ; "ragged_feature_tile")]
    #[test_case(64, 600, 96 ; "several_super_chunks")]
    #[test_case(4, 300, 8 ; "heavy_duplicates")]
    fn matches_reference(num_weights: usize, num_indices: usize, stride: usize) {
        let dims = TestDims::new(num_weights, num_indices, stride);
        let device = Default::default();
        let indices = repeating_indices(dims);
        let (grad, grad_host) = random_grad::<GpuBackend>(dims, &device);

        let actual = run_direct(grad, &indices, dims, None);
        let expected = reference_grad_weight(&grad_host, &indices, dims, None, false);
        assert_data_close(&actual, &expected, RTOL, ATOL, "direct");
    }

    #[test]
    fn padding_row_stays_zero() {
        let dims = TestDims::new(8, 200, 33);
        let device = Default::default();
        let indices = repeating_indices(dims);
        let padding_idx = Some(indices[5] as usize);
        let (grad, grad_host) = random_grad::<GpuBackend>(dims, &device);

        let actual = run_direct(grad, &indices, dims, padding_idx);
        let expected = reference_grad_weight(&grad_host, &indices, dims, padding_idx, false);
        assert_data_close(&actual, &expected, RTOL, ATOL, "direct_padding");

        let row = indices[5] as usize;
        assert!(actual[row * dims.stride..(row + 1) * dims.stride]
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let dims = TestDims::new(5, 500, 64);
        let device = Default::default();
        let indices = repeating_indices(dims);
        let (grad, _) = random_grad::<GpuBackend>(dims, &device);

        let first = run_direct(grad.clone(), &indices, dims, None);
        let second = run_direct(grad, &indices, dims, None);
        assert_eq!(first, second);
    }

    #[test]
    fn out_of_range_rows_are_inert() {
        let dims = TestDims::new(4, 4, 3);
        let device = Default::default();
        let indices = [0, 9, 0, 3];
        let (grad, grad_host) = random_grad::<GpuBackend>(dims, &device);

        let actual = run_direct(grad, &indices, dims, None);

        let in_range = [0, 3];
        let mut expected = vec![0.0f32; dims.num_weights * dims.stride];
        for (i, &idx) in indices.iter().enumerate() {
            if in_range.contains(&idx) {
                for f in 0..dims.stride {
                    expected[idx as usize * dims.stride + f] += grad_host[i * dims.stride + f];
                }
            }
        }
        assert_data_close(&actual, &expected, RTOL, ATOL, "direct_out_of_range");
    }

    #[test]
    fn rows_revisited_across_sub_chunks_accumulate() {
        // Row 0 is led by sub-group 0 in one sub-chunk and sub-group 1 in the
        // next, so every super-chunk reads a row the previous write just landed in.
        let pattern = [0i64, 1, 2, 3, 4, 5, 6, 7, 9, 0];
        let indices: Vec<i64> = pattern.iter().copied().cycle().take(40 * pattern.len()).collect();
        let dims = TestDims::new(10, indices.len(), 40);
        let device = Default::default();
        let (grad, grad_host) = random_grad::<GpuBackend>(dims, &device);

        let actual = run_direct(grad, &indices, dims, None);
        let expected = reference_grad_weight(&grad_host, &indices, dims, None, false);
        assert_data_close(&actual, &expected, RTOL, ATOL, "direct_revisited");
    }

    #[cfg(feature = "wgpu")]
    #[test]
    fn rejects_float_indices() {
        use crate::{
            EmbeddingError,
            test_utils::{CubeWgpu, float_tensor},
        };

        let device = Default::default();
        let grad = float_tensor::<CubeWgpu>(&[1.0; 6], [3, 2], &device);
        let indices = Tensor::<CubeWgpu, 1>::from_floats([0.0, 1.0, 0.0], &device);
        let grad_weight = Tensor::<CubeWgpu, 2>::zeros([2, 2], &device);

        let err = CubeWgpu::embedding_grad_direct(
            grad.into_primitive().tensor(),
            indices.into_primitive().tensor(),
            grad_weight.into_primitive().tensor(),
            None,
        );
        assert!(matches!(
            err,
            Err(EmbeddingError::InvalidIndexDType {
                argument: "indices",
                ..
            })
        ));
    }
}
