//! Tensor-level entry points.

use burn::tensor::{Int, Tensor, TensorPrimitive};
use tracing::debug;

use crate::{
    EmbeddingError,
    config::{AccumulationStrategy, EmbeddingGradConfig, RenormConfig},
    kernels::{EmbeddingBackwardBackend, util::ensure_same_device},
};

/// Accumulates the upstream gradient of an embedding lookup into a fresh
/// `[num_weights, stride]` gradient table.
///
/// Row `r` of the result is the sum of every `grad` row whose index is `r`,
/// divided by the number of such rows when `scale_grad_by_freq` is set. The
/// `padding_idx` row is all zeros.
pub fn accumulate_gradient<B: EmbeddingBackwardBackend>(
    grad: Tensor<B, 2>,
    indices: Tensor<B, 1, Int>,
    num_weights: usize,
    padding_idx: Option<usize>,
    scale_grad_by_freq: bool,
) -> Result<Tensor<B, 2>, EmbeddingError> {
    let config = EmbeddingGradConfig::new(num_weights)
        .with_padding_idx(padding_idx)
        .with_scale_grad_by_freq(scale_grad_by_freq);
    accumulate_gradient_with_config(grad, indices, &config)
}

/// [`accumulate_gradient`] driven by an [`EmbeddingGradConfig`].
pub fn accumulate_gradient_with_config<B: EmbeddingBackwardBackend>(
    grad: Tensor<B, 2>,
    indices: Tensor<B, 1, Int>,
    config: &EmbeddingGradConfig,
) -> Result<Tensor<B, 2>, EmbeddingError> {
    let [num_rows, stride] = grad.dims();
    let [num_indices] = indices.dims();
    let num_weights = config.num_weights;

    if num_rows != num_indices {
        return Err(EmbeddingError::ShapeMismatch {
            argument: "grad",
            found: vec![num_rows, stride],
            expected: format!("[{num_indices}, stride], one row per index"),
        });
    }
    check_num_weights(num_weights, stride)?;
    if let Some(padding_idx) = config.padding_idx.filter(|&idx| idx >= num_weights) {
        return Err(EmbeddingError::PaddingOutOfRange {
            padding_idx,
            num_weights,
        });
    }
    ensure_same_device("indices", &indices.device(), "grad", &grad.device())?;

    let strategy = AccumulationStrategy::select(num_indices, config);
    if strategy == AccumulationStrategy::Direct && config.scale_grad_by_freq {
        return Err(EmbeddingError::UnsupportedStrategy {
            strategy,
            reason: "scale gradients by frequency",
        });
    }

    let device = grad.device();
    if num_indices == 0 || num_weights == 0 || stride == 0 {
        return Ok(Tensor::zeros([num_weights, stride], &device));
    }

    // Layout, device and dtype problems must surface before any sort launches.
    let grad = grad.into_primitive().tensor();
    let indices = indices.into_primitive();
    B::embedding_validate("grad", grad.clone(), indices.clone())?;

    debug!(
        num_indices,
        num_weights,
        stride,
        ?strategy,
        padding_idx = ?config.padding_idx,
        scale_grad_by_freq = config.scale_grad_by_freq,
        "accumulating embedding gradient"
    );

    let grad_weight = Tensor::<B, 2>::zeros([num_weights, stride], &device)
        .into_primitive()
        .tensor();

    let out = match strategy {
        AccumulationStrategy::Direct => {
            B::embedding_grad_direct(grad, indices, grad_weight, config.padding_idx)?
        }
        AccumulationStrategy::SortGrouped => {
            let indices = Tensor::<B, 1, Int>::from_primitive(indices);
            let (sorted, permutation) = indices.sort_with_indices(0);
            let counts = if config.scale_grad_by_freq {
                Some(B::embedding_run_counts(sorted.clone().into_primitive())?)
            } else {
                None
            };
            B::embedding_grad_sorted(
                grad,
                sorted.into_primitive(),
                permutation.into_primitive(),
                counts,
                grad_weight,
                config.padding_idx,
            )?
        }
    };

    Ok(Tensor::from_primitive(TensorPrimitive::Float(out)))
}

/// [`accumulate_gradient_with_config`] for lookups with leading batch dimensions.
///
/// `grad` is `[..batch, stride]` and `indices` is `[..batch]`; both are
/// flattened over the batch dimensions first. `D` must equal `DI + 1`.
pub fn accumulate_gradient_batched<B: EmbeddingBackwardBackend, const D: usize, const DI: usize>(
    grad: Tensor<B, D>,
    indices: Tensor<B, DI, Int>,
    config: &EmbeddingGradConfig,
) -> Result<Tensor<B, 2>, EmbeddingError> {
    let grad_dims = grad.dims();
    let index_dims = indices.dims();

    if D != DI + 1 || grad_dims[..DI] != index_dims[..] {
        return Err(EmbeddingError::ShapeMismatch {
            argument: "grad",
            found: grad_dims.to_vec(),
            expected: format!("{index_dims:?} followed by the row width"),
        });
    }

    let stride = grad_dims[D - 1];
    let num_indices = index_dims.iter().product::<usize>();

    accumulate_gradient_with_config(
        grad.reshape([num_indices, stride]),
        indices.reshape([num_indices]),
        config,
    )
}

/// Rescales, in place, every row of `weight` named in `indices` whose
/// `norm_type`-norm exceeds `max_norm` so that it no longer does.
///
/// Duplicate indices are visited once. The returned tensor shares storage with
/// `weight`; other rows are left bit-identical.
pub fn renormalize_rows<B: EmbeddingBackwardBackend>(
    weight: Tensor<B, 2>,
    indices: Tensor<B, 1, Int>,
    max_norm: f64,
    norm_type: f64,
) -> Result<Tensor<B, 2>, EmbeddingError> {
    let config = RenormConfig::new(max_norm).with_norm_type(norm_type);
    renormalize_rows_with_config(weight, indices, &config)
}

/// [`renormalize_rows`] driven by a [`RenormConfig`].
pub fn renormalize_rows_with_config<B: EmbeddingBackwardBackend>(
    weight: Tensor<B, 2>,
    indices: Tensor<B, 1, Int>,
    config: &RenormConfig,
) -> Result<Tensor<B, 2>, EmbeddingError> {
    let [num_weights, stride] = weight.dims();
    let [num_indices] = indices.dims();

    check_num_weights(num_weights, stride)?;
    ensure_same_device("indices", &indices.device(), "weight", &weight.device())?;

    if num_indices == 0 || num_weights == 0 || stride == 0 {
        return Ok(weight);
    }

    let weight = weight.into_primitive().tensor();
    let indices = indices.into_primitive();
    B::embedding_validate("weight", weight.clone(), indices.clone())?;

    debug!(
        num_indices,
        num_weights,
        stride,
        max_norm = config.max_norm,
        norm_type = config.norm_type,
        "renormalizing embedding rows"
    );

    let sorted = Tensor::<B, 1, Int>::from_primitive(indices).sort(0);
    let out = B::embedding_renorm_sorted(
        weight,
        sorted.into_primitive(),
        config.max_norm,
        config.norm_type,
    )?;

    Ok(Tensor::from_primitive(TensorPrimitive::Float(out)))
}

/// Rows are addressed as `u32` on the device, with `u32::MAX` reserved.
fn check_num_weights(num_weights: usize, stride: usize) -> Result<(), EmbeddingError> {
    if num_weights >= u32::MAX as usize {
        return Err(EmbeddingError::ShapeMismatch {
            argument: "num_weights",
            found: vec![num_weights, stride],
            expected: format!("fewer than {} rows", u32::MAX),
        });
    }
    Ok(())
}
