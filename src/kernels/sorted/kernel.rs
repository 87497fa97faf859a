use cubecl::prelude::*;

/// Units along X; each owns `TILE` feature columns spaced `LANES` apart.
pub const LANES: usize = 32;
/// Register tile length per unit.
pub const TILE: usize = 4;
/// Sorted positions handled by one cube (units along Y).
pub const ROWS_PER_CUBE: usize = 4;
/// Feature columns covered by one cube along the Y grid axis.
pub const FEATURES_PER_CUBE: usize = LANES * TILE;

/// Sort-grouped accumulation kernel.
///
/// Thread layout within cube: 2D grid of (LANES, ROWS_PER_CUBE)
/// - UNIT_POS_X: lane within the feature tile
/// - UNIT_POS_Y: sorted position within the cube's block of positions
///
/// Grid: positions are spread over X and Z, feature tiles run along Y.
///
/// Only the first position of each run of equal indices does any work. It
/// walks the run in sorted order and writes its tile once, so every element of
/// `grad_weight` has at most one writer.
///
/// Shapes:
/// - sorted_indices, permutation, counts: [num_indices]
/// - grad: [num_indices, stride]
/// - grad_weight: [num_weights, stride], zero-initialized
#[cube(launch)]
pub fn sorted_accumulate_kernel<F: Float, A: Float, I: Int>(
    sorted_indices: &Tensor<I>,
    permutation: &Tensor<I>,
    counts: &Tensor<I>,
    grad: &Tensor<F>,
    grad_weight: &mut Tensor<F>,
    padding_row: u32,
    #[comptime] scale_by_frequency: bool,
) {
    let lane = UNIT_POS_X as usize;
    let block = CUBE_POS_Z as usize * CUBE_COUNT_X as usize + CUBE_POS_X as usize;
    let position = block * ROWS_PER_CUBE + UNIT_POS_Y as usize;

    let num_indices = sorted_indices.shape(0) as usize;
    let num_weights = grad_weight.shape(0) as usize;
    let stride = grad_weight.shape(1) as usize;
    let tile_start = CUBE_POS_Y as usize * FEATURES_PER_CUBE + lane;

    if position < num_indices {
        let row = u32::cast_from(sorted_indices[position]);

        let mut owner = true;
        if position > 0 {
            owner = u32::cast_from(sorted_indices[position - 1]) != row;
        }

        if owner && row != padding_row && (row as usize) < num_weights {
            let mut scale = A::new(1.0);
            if comptime!(scale_by_frequency) {
                scale = A::new(1.0) / A::cast_from(counts[position]);
            }

            let mut acc = Array::<A>::new(TILE);
            #[unroll]
            for t in 0..TILE {
                acc[t] = A::new(0.0);
            }

            let mut member = position;
            loop {
                if member >= num_indices {
                    break;
                }
                if u32::cast_from(sorted_indices[member]) != row {
                    break;
                }

                let src_base = u32::cast_from(permutation[member]) as usize * stride;

                #[unroll]
                for t in 0..TILE {
                    let feature = tile_start + t * LANES;
                    if feature < stride {
                        acc[t] += A::cast_from(grad[src_base + feature]) * scale;
                    }
                }

                member += 1;
            }

            let dst_base = row as usize * stride;

            #[unroll]
            for t in 0..TILE {
                let feature = tile_start + t * LANES;
                if feature < stride {
                    grad_weight[dst_base + feature] = F::cast_from(acc[t]);
                }
            }
        }
    }
}

/// Units per cube of the run-length kernel.
pub const RUN_UNITS: usize = 256;

/// Writes, for every sorted position, the length of the run it belongs to.
///
/// The first position of a run measures it and fills every member; others idle.
#[cube(launch)]
pub fn run_length_kernel<I: Int>(sorted_indices: &Tensor<I>, counts: &mut Tensor<I>) {
    let block = CUBE_POS_Z as usize * CUBE_COUNT_X as usize + CUBE_POS_X as usize;
    let position = block * RUN_UNITS + UNIT_POS_X as usize;
    let num_indices = sorted_indices.shape(0) as usize;

    if position < num_indices {
        let value = sorted_indices[position];

        let mut owner = true;
        if position > 0 {
            owner = sorted_indices[position - 1] != value;
        }

        if owner {
            let mut end = position + 1;
            loop {
                if end >= num_indices {
                    break;
                }
                if sorted_indices[end] != value {
                    break;
                }
                end += 1;
            }

            let length = I::cast_from((end - position) as u32);
            for member in position..end {
                counts[member] = length;
            }
        }
    }
}
