use burn::tensor::{
    backend::Backend,
    ops::{FloatTensor, IntTensor},
};

use crate::EmbeddingError;

/// Backends that can run the embedding backward kernels.
///
/// Index tensors are expected in the backend's integer type and every tensor
/// must be contiguous. Methods that take a `grad_weight` or `weight` write into
/// it and return it.
pub trait EmbeddingBackwardBackend: Backend {
    /// Checks layout, device residency and element types of a table-like
    /// float tensor and an index list without launching anything.
    ///
    /// `table_argument` names the float tensor in the returned error.
    fn embedding_validate(
        table_argument: &'static str,
        table: FloatTensor<Self>,
        indices: IntTensor<Self>,
    ) -> Result<(), EmbeddingError>;

    /// Accumulates `grad` rows into the zero-initialized `grad_weight` by merging
    /// duplicate indices inside each cube.
    fn embedding_grad_direct(
        grad: FloatTensor<Self>,
        indices: IntTensor<Self>,
        grad_weight: FloatTensor<Self>,
        padding_idx: Option<usize>,
    ) -> Result<FloatTensor<Self>, EmbeddingError>;

    /// Length of the run of equal values each position of `sorted_indices` is in.
    fn embedding_run_counts(
        sorted_indices: IntTensor<Self>,
    ) -> Result<IntTensor<Self>, EmbeddingError>;

    /// Accumulates `grad` rows into the zero-initialized `grad_weight` given the
    /// value-sorted indices and the permutation back to original positions.
    ///
    /// With `counts`, each contribution is divided by its row's frequency.
    fn embedding_grad_sorted(
        grad: FloatTensor<Self>,
        sorted_indices: IntTensor<Self>,
        permutation: IntTensor<Self>,
        counts: Option<IntTensor<Self>>,
        grad_weight: FloatTensor<Self>,
        padding_idx: Option<usize>,
    ) -> Result<FloatTensor<Self>, EmbeddingError>;

    /// Clips every row named in `sorted_indices` to a `norm_type`-norm of at
    /// most `max_norm`, in place.
    fn embedding_renorm_sorted(
        weight: FloatTensor<Self>,
        sorted_indices: IntTensor<Self>,
        max_norm: f64,
        norm_type: f64,
    ) -> Result<FloatTensor<Self>, EmbeddingError>;
}
