//! Small-batch gradient accumulation with in-cube duplicate merging.
//!
//! Each cube owns a tile of `LANES` feature columns and sweeps the whole index
//! batch. Duplicates inside a sub-chunk are merged by a leader before the single
//! global write, so no two units ever update the same element concurrently.

use cubecl::prelude::*;

/// Feature columns per cube (units along X).
pub const LANES: usize = 32;
/// Candidate destination rows per sub-chunk (units along Y).
pub const SUB_GROUPS: usize = 8;
/// Indices staged in shared memory at once.
pub const SUPER_CHUNK: usize = LANES * SUB_GROUPS;

/// Direct accumulation kernel.
///
/// Thread layout within cube: 2D grid of (LANES, SUB_GROUPS)
/// - UNIT_POS_X: feature column within the tile
/// - UNIT_POS_Y: sub-group, i.e. which index of the current sub-chunk
///
/// Shared memory layout:
/// - staged: [SUB_GROUPS, LANES] - gradient values staged by each sub-group
/// - batch_rows: [SUPER_CHUNK] - destination rows of the current super-chunk
///
/// Shapes:
/// - grad: [num_indices, stride]
/// - indices: [num_indices]
/// - grad_weight: [num_weights, stride], zero-initialized, accumulated in place
#[cube(launch)]
pub fn direct_accumulate_kernel<F: Float, A: Float, I: Int>(
    grad: &Tensor<F>,
    indices: &Tensor<I>,
    grad_weight: &mut Tensor<F>,
    padding_row: u32,
) {
    let lane = UNIT_POS_X as usize;
    let sub_group = UNIT_POS_Y as usize;
    let tid = sub_group * LANES + lane;

    let num_indices = indices.shape(0) as usize;
    let num_weights = grad_weight.shape(0) as usize;
    let stride = grad_weight.shape(1) as usize;
    let feature = CUBE_POS_X as usize * LANES + lane;

    let mut staged = SharedMemory::<A>::new(SUPER_CHUNK);
    let mut batch_rows = SharedMemory::<u32>::new(SUPER_CHUNK);

    for batch_start in range_stepped(0, num_indices, SUPER_CHUNK) {
        let mut batch_end = num_indices;
        if batch_start + SUPER_CHUNK < num_indices {
            batch_end = batch_start + SUPER_CHUNK;
        }

        if batch_start + tid < batch_end {
            batch_rows[tid] = u32::cast_from(indices[batch_start + tid]);
        }

        sync_cube();

        for chunk_start in range_stepped(batch_start, batch_end, SUB_GROUPS) {
            let chunk_offset = chunk_start - batch_start;
            let mut chunk_len = batch_end - chunk_start;
            if chunk_len > SUB_GROUPS {
                chunk_len = SUB_GROUPS;
            }

            let src_row = chunk_start + sub_group;
            let mut dst_row = padding_row;
            if sub_group < chunk_len {
                dst_row = batch_rows[chunk_offset + sub_group];
            }
            let live = sub_group < chunk_len
                && dst_row != padding_row
                && (dst_row as usize) < num_weights;

            if live && feature < stride {
                staged[tid] = A::cast_from(grad[src_row * stride + feature]);
            }

            sync_cube();

            if live {
                // Bit p is set when sub-group p targets the same row.
                let mut matches = 0u32;
                for peer in 0..chunk_len {
                    if batch_rows[chunk_offset + peer] == dst_row {
                        matches |= 1u32 << (peer as u32);
                    }
                }

                let leader = matches.find_first_set() - 1;
                if leader == sub_group as u32 {
                    let mut remaining = matches ^ (1u32 << leader);
                    let mut acc = staged[tid];

                    loop {
                        if remaining == 0 {
                            break;
                        }
                        let peer = remaining.find_first_set() - 1;
                        acc += staged[peer as usize * LANES + lane];
                        remaining ^= 1u32 << peer;
                    }

                    if feature < stride {
                        let out = dst_row as usize * stride + feature;
                        grad_weight[out] = F::cast_from(A::cast_from(grad_weight[out]) + acc);
                    }
                }
            }

            // A later sub-chunk may elect another leader for the same row, so the
            // global write must be visible before its read. `staged` is reused too.
            sync_storage();
            sync_cube();
        }
    }
}
