use std::fmt::Debug;

use burn_backend::Shape;
use burn_cubecl::{
    CubeElement, CubeRuntime, FloatElement, IntElement, ops::numeric::empty_device,
    tensor::CubeTensor,
};

use super::bundle::TensorBundle;
use crate::EmbeddingError;

/// Hardware limit on the number of cubes along a single grid dimension.
pub const MAX_CUBES_PER_DIM: usize = 65_535;

/// Kernel-side padding sentinel meaning "no padding row".
pub const NO_PADDING: u32 = u32::MAX;

/// Create an empty tensor of element `E` with the same client/device as the template.
pub fn empty_like<R: CubeRuntime, E: CubeElement>(
    template: &CubeTensor<R>,
    shape: impl Into<Shape>,
) -> CubeTensor<R> {
    empty_device::<R, E>(
        template.client.clone(),
        template.device.clone(),
        shape.into(),
    )
}

/// Encodes an optional padding row for the kernels.
///
/// Rows are addressed as `u32` on the device; callers have already checked
/// `idx < num_weights < u32::MAX`.
#[must_use]
pub fn padding_row(padding_idx: Option<usize>) -> u32 {
    padding_idx.map_or(NO_PADDING, |idx| idx as u32)
}

/// Spreads `num_cubes` one-dimensional work items over the X and Z grid axes.
///
/// Kernels recover the flat index as `CUBE_POS_Z * CUBE_COUNT_X + CUBE_POS_X`
/// and must ignore indices past `num_cubes`.
#[must_use]
pub fn spread_cubes(num_cubes: usize) -> (u32, u32) {
    let num_cubes = num_cubes.max(1);
    let x = num_cubes.min(MAX_CUBES_PER_DIM);
    let z = num_cubes.div_ceil(x);
    (x as u32, z as u32)
}

/// Rejects a tensor whose memory layout isn't row-major contiguous.
pub fn check_contiguous<R: CubeRuntime>(
    argument: &'static str,
    tensor: &CubeTensor<R>,
) -> Result<(), EmbeddingError> {
    if tensor.is_contiguous() {
        Ok(())
    } else {
        Err(EmbeddingError::NonContiguous {
            argument,
            shape: tensor.shape.dims.clone(),
            strides: tensor.strides.clone(),
        })
    }
}

/// Rejects `argument` living on another device than `reference`.
pub fn ensure_same_device<D: PartialEq + Debug>(
    argument: &'static str,
    found: &D,
    reference: &'static str,
    expected: &D,
) -> Result<(), EmbeddingError> {
    if found == expected {
        Ok(())
    } else {
        Err(EmbeddingError::DeviceMismatch {
            argument,
            reference,
            found: format!("{found:?}"),
            expected: format!("{expected:?}"),
        })
    }
}

/// Rejects bundles holding a non-contiguous tensor or tensors on different devices.
///
/// The first tensor of the bundle is the device reference.
pub fn check_bundle<R, B, const N: usize>(bundle: &B) -> Result<(), EmbeddingError>
where
    R: CubeRuntime,
    B: TensorBundle<CubeTensor<R>, N>,
{
    let named = bundle.named();
    let (reference, first) = named[0];

    for (argument, tensor) in named {
        check_contiguous(argument, tensor)?;
        ensure_same_device(argument, &tensor.device, reference, &first.device)?;
    }

    Ok(())
}

/// Rejects index tensors whose element type isn't the backend's integer type.
pub fn check_index_dtype<R: CubeRuntime, I: IntElement>(
    argument: &'static str,
    tensor: &CubeTensor<R>,
) -> Result<(), EmbeddingError> {
    if tensor.dtype == I::dtype() {
        Ok(())
    } else {
        Err(EmbeddingError::InvalidIndexDType {
            argument,
            dtype: tensor.dtype,
        })
    }
}

/// Rejects float tensors stored in a type other than the kernel's storage type.
pub fn check_float_dtype<R: CubeRuntime, F: FloatElement>(
    tensor: &CubeTensor<R>,
) -> Result<(), EmbeddingError> {
    if tensor.dtype == F::dtype() {
        Ok(())
    } else {
        Err(EmbeddingError::UnsupportedDType {
            dtype: tensor.dtype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1 => (1, 1) ; "single")]
    #[test_case(0 => (1, 1) ; "empty_still_launchable")]
    #[test_case(65_535 => (65_535, 1) ; "one_full_row")]
    #[test_case(65_536 => (65_535, 2) ; "spills_into_z")]
    #[test_case(200_000 => (65_535, 4) ; "several_layers")]
    fn spreads_over_two_axes(num_cubes: usize) -> (u32, u32) {
        spread_cubes(num_cubes)
    }

    #[test]
    fn device_mismatch_names_both_arguments() {
        assert!(ensure_same_device("indices", &0usize, "grad", &0usize).is_ok());

        let err = ensure_same_device("indices", &1usize, "grad", &0usize).unwrap_err();
        match err {
            EmbeddingError::DeviceMismatch {
                argument,
                reference,
                found,
                expected,
            } => {
                assert_eq!((argument, reference), ("indices", "grad"));
                assert_eq!((found.as_str(), expected.as_str()), ("1", "0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn padding_sentinel() {
        assert_eq!(padding_row(None), NO_PADDING);
        assert_eq!(padding_row(Some(3)), 3);
    }
}
