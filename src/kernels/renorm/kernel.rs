use cubecl::prelude::*;

/// Units per cube; one cube per sorted position.
pub const RENORM_UNITS: usize = 128;
/// log2(RENORM_UNITS)
const REDUCE_LEVELS: usize = 7;

const NORM_EPSILON: f32 = 1e-7;

/// Clips the p-norm of every row addressed by `sorted_indices` to `max_norm`.
///
/// Cube `c` handles sorted position `c` and only does work when that position
/// is the first of its run, so each distinct row is visited by exactly one
/// cube. All branches around `sync_cube` depend on the cube position only.
///
/// Shapes:
/// - weight: [num_weights, stride], updated in place
/// - sorted_indices: [num_indices]
#[cube(launch)]
pub fn renorm_kernel<F: Float, A: Float + CubeElement, I: Int>(
    weight: &mut Tensor<F>,
    sorted_indices: &Tensor<I>,
    max_norm: A,
    norm_type: A,
) {
    let position = CUBE_POS_Z as usize * CUBE_COUNT_X as usize + CUBE_POS_X as usize;
    let unit = UNIT_POS_X as usize;

    let num_indices = sorted_indices.shape(0) as usize;
    let num_weights = weight.shape(0) as usize;
    let stride = weight.shape(1) as usize;

    let mut partials = SharedMemory::<A>::new(RENORM_UNITS);

    let mut row = 0u32;
    let mut owns_row = false;
    if position < num_indices {
        row = u32::cast_from(sorted_indices[position]);
        owns_row = (row as usize) < num_weights;
        if position > 0 {
            owns_row = owns_row && u32::cast_from(sorted_indices[position - 1]) != row;
        }
    }

    if owns_row {
        let base = row as usize * stride;

        let mut partial = A::new(0.0);
        for feature in range_stepped(unit, stride, RENORM_UNITS) {
            let x = A::cast_from(weight[base + feature]);
            if norm_type == A::new(1.0) {
                partial += A::abs(x);
            } else if norm_type == A::new(2.0) {
                partial += x * x;
            } else {
                partial += A::powf(A::abs(x), norm_type);
            }
        }
        partials[unit] = partial;

        sync_cube();

        #[unroll]
        for level in 0..REDUCE_LEVELS {
            let half = RENORM_UNITS >> (level + 1);
            if unit < half {
                let other = partials[unit + half];
                partials[unit] += other;
            }
            sync_cube();
        }

        if unit == 0 {
            let total = partials[0];
            let mut norm = total;
            if norm_type == A::new(2.0) {
                norm = A::sqrt(total);
            } else if norm_type != A::new(1.0) {
                norm = A::powf(total, A::new(1.0) / norm_type);
            }
            partials[0] = norm;
        }

        sync_cube();

        let norm = partials[0];
        if norm > max_norm {
            let scale = max_norm / (norm + A::new(NORM_EPSILON));
            for feature in range_stepped(unit, stride, RENORM_UNITS) {
                let idx = base + feature;
                weight[idx] = F::cast_from(A::cast_from(weight[idx]) * scale);
            }
        }
    }
}
