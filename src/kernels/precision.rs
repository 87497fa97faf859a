//! Storage → accumulation type policy.
//!
//! Gradients and norms are summed in a type at least as wide as the stored
//! element, then cast back on the single write per row.

use burn::tensor::DType;

use crate::EmbeddingError;

/// Accumulation type used inside the kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accumulator {
    F32,
    F64,
}

impl Accumulator {
    /// Looks up the accumulation type registered for a storage type.
    ///
    /// | storage                     | accumulation |
    /// |-----------------------------|--------------|
    /// | `f16`, `bf16`, `flex32`, `f32` | `f32`     |
    /// | `f64`                       | `f64`        |
    pub fn for_storage(dtype: DType) -> Result<Self, EmbeddingError> {
        match dtype {
            DType::F16 | DType::BF16 | DType::Flex32 | DType::F32 => Ok(Self::F32),
            DType::F64 => Ok(Self::F64),
            dtype => Err(EmbeddingError::UnsupportedDType { dtype }),
        }
    }
}

/// Runs `$body` with `$acc` bound as a type alias for the accumulation type.
///
/// ```ignore
/// with_accumulator!(Accumulator::for_storage(dtype)?, |A| launch::<F, A, I, R>(..))
/// ```
macro_rules! with_accumulator {
    ($accumulator:expr, |$acc:ident| $body:expr) => {
        match $accumulator {
            $crate::kernels::precision::Accumulator::F32 => {
                type $acc = f32;
                $body
            }
            $crate::kernels::precision::Accumulator::F64 => {
                type $acc = f64;
                $body
            }
        }
    };
}

pub(crate) use with_accumulator;
