use burn::tensor::DType;

/// Failure of an accumulation or renormalization call.
///
/// Every variant is fatal to the enclosing call. Precondition variants are raised
/// before any kernel is launched, so no tensor has been touched when they surface.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("`{argument}` must be contiguous (shape {shape:?}, strides {strides:?})")]
    NonContiguous {
        argument: &'static str,
        shape: Vec<usize>,
        strides: Vec<usize>,
    },

    #[error("`{argument}` lives on {found} but `{reference}` lives on {expected}")]
    DeviceMismatch {
        argument: &'static str,
        reference: &'static str,
        found: String,
        expected: String,
    },

    #[error("`{argument}` has shape {found:?}, expected {expected}")]
    ShapeMismatch {
        argument: &'static str,
        found: Vec<usize>,
        expected: String,
    },

    #[error("`{argument}` must hold integer indices, got {dtype:?}")]
    InvalidIndexDType { argument: &'static str, dtype: DType },

    #[error("no accumulation type is registered for storage type {dtype:?}")]
    UnsupportedDType { dtype: DType },

    #[error("padding_idx {padding_idx} is out of range for a table of {num_weights} rows")]
    PaddingOutOfRange {
        padding_idx: usize,
        num_weights: usize,
    },

    #[error("the {strategy:?} strategy cannot {reason}")]
    UnsupportedStrategy {
        strategy: crate::config::AccumulationStrategy,
        reason: &'static str,
    },

    #[error("launch of `{kernel}` failed: {reason}")]
    Launch { kernel: &'static str, reason: String },
}

impl EmbeddingError {
    pub(crate) fn launch(kernel: &'static str, err: impl std::fmt::Debug) -> Self {
        Self::Launch {
            kernel,
            reason: format!("{err:?}"),
        }
    }
}
