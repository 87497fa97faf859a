//! End-to-end scenarios through the public API on the default GPU backend.

use burn::tensor::{Int, Tensor, TensorData};
use embedding_backward::{
    AccumulationStrategy, EmbeddingGradConfig, GpuBackend, accumulate_gradient,
    accumulate_gradient_with_config, renormalize_rows,
};
use test_case::test_case;

type B = GpuBackend;

fn indices(values: &[i64]) -> Tensor<B, 1, Int> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), &Default::default())
}

fn matrix(values: &[f32], shape: [usize; 2]) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values.to_vec(), shape), &Default::default())
}

fn host(tensor: Tensor<B, 2>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}

fn config(strategy: AccumulationStrategy) -> EmbeddingGradConfig {
    EmbeddingGradConfig::new(5).with_strategy(Some(strategy))
}

#[test_case(AccumulationStrategy::Direct ; "direct")]
#[test_case(AccumulationStrategy::SortGrouped ; "sort_grouped")]
fn duplicate_rows_are_summed(strategy: AccumulationStrategy) {
    let grad = matrix(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0], [3, 3]);

    let out = accumulate_gradient_with_config(grad, indices(&[0, 0, 2]), &config(strategy))
        .unwrap();

    #[rustfmt::skip]
    let expected = [
        2.0, 2.0, 2.0,
        0.0, 0.0, 0.0,
        2.0, 2.0, 2.0,
        0.0, 0.0, 0.0,
        0.0, 0.0, 0.0,
    ];
    assert_eq!(host(out), expected);
}

#[test_case(AccumulationStrategy::Direct ; "direct")]
#[test_case(AccumulationStrategy::SortGrouped ; "sort_grouped")]
fn padding_row_is_excluded(strategy: AccumulationStrategy) {
    let grad = matrix(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0], [3, 3]);

    let out = accumulate_gradient_with_config(
        grad,
        indices(&[0, 0, 2]),
        &config(strategy).with_padding_idx(Some(0)),
    )
    .unwrap();

    let out = host(out);
    assert_eq!(&out[..3], &[0.0, 0.0, 0.0]);
    assert_eq!(&out[6..9], &[2.0, 2.0, 2.0]);
}

#[test]
fn frequency_scaling_averages_repeats() {
    let grad = matrix(&[1.0; 9], [3, 3]);

    let out = accumulate_gradient(grad, indices(&[3, 3, 3]), 5, None, true).unwrap();

    let out = host(out);
    for (f, value) in out[9..12].iter().enumerate() {
        assert!((value - 1.0).abs() < 1e-6, "feature {f}: {value}");
    }
    assert!(out[..9].iter().chain(&out[12..]).all(|&v| v == 0.0));
}

#[test]
fn long_row_is_clipped_to_max_norm() {
    let weight = matrix(&[3.0, 4.0, 0.1, 0.2], [2, 2]);

    let out = renormalize_rows(weight, indices(&[0, 1, 0]), 1.0, 2.0).unwrap();

    let out = host(out);
    assert!((out[0] - 0.6).abs() < 1e-5);
    assert!((out[1] - 0.8).abs() < 1e-5);
    assert_eq!(&out[2..], &[0.1, 0.2]);
}

#[test]
fn renormalized_norms_respect_the_bound() {
    let num_weights = 20;
    let stride = 257;
    let values: Vec<f32> = (0..num_weights * stride)
        .map(|i| ((i * 37 % 101) as f32 - 50.0) / 10.0)
        .collect();
    let selected: Vec<i64> = (0..num_weights as i64).step_by(3).chain([3, 3, 6]).collect();

    let out = renormalize_rows(
        matrix(&values, [num_weights, stride]),
        indices(&selected),
        2.5,
        2.0,
    )
    .unwrap();

    let out = host(out);
    for (row, chunk) in out.chunks(stride).enumerate() {
        let norm = chunk.iter().map(|v| v * v).sum::<f32>().sqrt();
        if selected.contains(&(row as i64)) {
            assert!(norm <= 2.5 + 1e-4, "row {row} has norm {norm}");
        } else {
            assert_eq!(chunk, &values[row * stride..(row + 1) * stride]);
        }
    }
}
