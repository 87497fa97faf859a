//! Shared test utilities: host reference implementations and tolerance checks.

use burn::tensor::{Distribution, Int, Tensor, TensorData};
use burn_backend::Backend;

/// Un-fused wgpu backend, for tests that need the raw tensor layout.
#[cfg(feature = "wgpu")]
pub type CubeWgpu = burn_cubecl::CubeBackend<burn::backend::wgpu::WgpuRuntime, f32, i32, u32>;

/// Problem size for accumulation tests.
#[derive(Debug, Clone, Copy)]
pub struct TestDims {
    pub num_weights: usize,
    pub num_indices: usize,
    pub stride: usize,
}

impl TestDims {
    pub fn new(num_weights: usize, num_indices: usize, stride: usize) -> Self {
        Self {
            num_weights,
            num_indices,
            stride,
        }
    }
}

/// Deterministic index list with plenty of repeats.
///
/// Position `i` maps to `(i * i + 3 * i) % num_weights`, which hits some rows
/// many times and others never.
pub fn repeating_indices(dims: TestDims) -> Vec<i64> {
    (0..dims.num_indices)
        .map(|i| ((i * i + 3 * i) % dims.num_weights) as i64)
        .collect()
}

pub fn index_tensor<B: Backend>(indices: &[i64], device: &B::Device) -> Tensor<B, 1, Int> {
    Tensor::from_data(TensorData::new(indices.to_vec(), [indices.len()]), device)
}

pub fn float_tensor<B: Backend>(
    values: &[f32],
    shape: [usize; 2],
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), shape), device)
}

/// Random upstream gradient, returned along with its host copy.
pub fn random_grad<B: Backend>(dims: TestDims, device: &B::Device) -> (Tensor<B, 2>, Vec<f32>) {
    let grad = Tensor::<B, 2>::random(
        [dims.num_indices, dims.stride],
        Distribution::Normal(0.0, 1.0),
        device,
    );
    let host = grad.to_data().to_vec::<f32>().unwrap();
    (grad, host)
}

pub fn to_host<B: Backend>(tensor: Tensor<B, 2>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}

pub fn int_to_host<B: Backend>(tensor: Tensor<B, 1, Int>) -> Vec<i64> {
    tensor.into_data().convert::<i64>().to_vec::<i64>().unwrap()
}

/// Serial gradient accumulation, summed in f64.
pub fn reference_grad_weight(
    grad: &[f32],
    indices: &[i64],
    dims: TestDims,
    padding_idx: Option<usize>,
    scale_grad_by_freq: bool,
) -> Vec<f32> {
    let stride = dims.stride;

    let mut counts = vec![0usize; dims.num_weights];
    for &idx in indices {
        counts[idx as usize] += 1;
    }

    let mut acc = vec![0.0f64; dims.num_weights * stride];
    for (i, &idx) in indices.iter().enumerate() {
        let row = idx as usize;
        if Some(row) == padding_idx {
            continue;
        }
        let scale = if scale_grad_by_freq {
            1.0 / counts[row] as f64
        } else {
            1.0
        };
        for f in 0..stride {
            acc[row * stride + f] += f64::from(grad[i * stride + f]) * scale;
        }
    }

    acc.into_iter().map(|v| v as f32).collect()
}

/// Serial max-norm clipping of every distinct row in `indices`.
pub fn reference_renorm(
    weight: &[f32],
    indices: &[i64],
    stride: usize,
    max_norm: f64,
    norm_type: f64,
) -> Vec<f32> {
    let mut out = weight.to_vec();
    let mut rows: Vec<usize> = indices.iter().map(|&i| i as usize).collect();
    rows.sort_unstable();
    rows.dedup();

    for row in rows {
        let slice = &mut out[row * stride..(row + 1) * stride];
        let total: f64 = slice
            .iter()
            .map(|&x| f64::from(x).abs().powf(norm_type))
            .sum();
        let norm = total.powf(1.0 / norm_type);
        if norm > max_norm {
            let scale = max_norm / (norm + 1e-7);
            for x in slice.iter_mut() {
                *x = (f64::from(*x) * scale) as f32;
            }
        }
    }

    out
}

/// Assert two f32 slices are close within relative and absolute tolerance.
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_data_close(a: &[f32], b: &[f32], rtol: f32, atol: f32, name: &str) {
    assert_eq!(
        a.len(),
        b.len(),
        "{name}: Data sizes don't match: {} vs {}",
        a.len(),
        b.len()
    );

    for (i, (&av, &bv)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (av - bv).abs();
        let tolerance = atol + rtol * bv.abs();
        assert!(
            diff <= tolerance,
            "{name}: Mismatch at index {i}: {av} vs {bv} (diff: {diff}, tolerance: {tolerance})",
        );
    }
}
