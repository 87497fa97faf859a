use burn::backend::ir::{InitOperationIr, OperationIr};
use burn::tensor::ops::{FloatTensor, IntTensor};
use burn_backend::TensorMetadata;
use burn_fusion::{
    Fusion, FusionBackend, NoOp, client::GlobalFusionClient, stream::OperationStreams,
};

use crate::{EmbeddingError, kernels::backend::EmbeddingBackwardBackend};

fn fusion_in<B: FusionBackend>(tensor: FloatTensor<Fusion<B>>) -> FloatTensor<B> {
    tensor.client.clone().resolve_tensor_float::<B>(tensor)
}

fn fusion_in_int<B: FusionBackend>(tensor: IntTensor<Fusion<B>>) -> IntTensor<B> {
    tensor.client.clone().resolve_tensor_int::<B>(tensor)
}

fn register<B: FusionBackend>(
    client: &GlobalFusionClient<B::FusionRuntime>,
    desc: InitOperationIr,
) -> Result<FloatTensor<Fusion<B>>, EmbeddingError> {
    client
        .register(
            OperationStreams::default(),
            OperationIr::Init(desc),
            NoOp::<B>::new(),
        )
        .pop()
        .ok_or_else(|| EmbeddingError::launch("fusion_register", "no output tensor registered"))
}

fn fusion_out<B: FusionBackend>(
    tensor: FloatTensor<B>,
    client: &GlobalFusionClient<B::FusionRuntime>,
) -> Result<FloatTensor<Fusion<B>>, EmbeddingError> {
    let shape = tensor.shape();
    let dtype = tensor.dtype();
    let handle = B::float_tensor_handle(tensor);
    let desc = InitOperationIr::create(shape, dtype, || client.register_tensor_handle(handle));
    register::<B>(client, desc)
}

fn fusion_out_int<B: FusionBackend>(
    tensor: IntTensor<B>,
    client: &GlobalFusionClient<B::FusionRuntime>,
) -> Result<IntTensor<Fusion<B>>, EmbeddingError> {
    let shape = tensor.shape();
    let dtype = tensor.dtype();
    let handle = B::int_tensor_handle(tensor);
    let desc = InitOperationIr::create(shape, dtype, || client.register_tensor_handle(handle));
    register::<B>(client, desc)
}

impl<B> EmbeddingBackwardBackend for Fusion<B>
where
    B: EmbeddingBackwardBackend + FusionBackend,
{
    fn embedding_validate(
        table_argument: &'static str,
        table: FloatTensor<Self>,
        indices: IntTensor<Self>,
    ) -> Result<(), EmbeddingError> {
        B::embedding_validate(
            table_argument,
            fusion_in::<B>(table),
            fusion_in_int::<B>(indices),
        )
    }

    fn embedding_grad_direct(
        grad: FloatTensor<Self>,
        indices: IntTensor<Self>,
        grad_weight: FloatTensor<Self>,
        padding_idx: Option<usize>,
    ) -> Result<FloatTensor<Self>, EmbeddingError> {
        let client = grad.client.clone();
        let out = B::embedding_grad_direct(
            fusion_in::<B>(grad),
            fusion_in_int::<B>(indices),
            fusion_in::<B>(grad_weight),
            padding_idx,
        )?;
        fusion_out::<B>(out, &client)
    }

    fn embedding_run_counts(
        sorted_indices: IntTensor<Self>,
    ) -> Result<IntTensor<Self>, EmbeddingError> {
        let client = sorted_indices.client.clone();
        let counts = B::embedding_run_counts(fusion_in_int::<B>(sorted_indices))?;
        fusion_out_int::<B>(counts, &client)
    }

    fn embedding_grad_sorted(
        grad: FloatTensor<Self>,
        sorted_indices: IntTensor<Self>,
        permutation: IntTensor<Self>,
        counts: Option<IntTensor<Self>>,
        grad_weight: FloatTensor<Self>,
        padding_idx: Option<usize>,
    ) -> Result<FloatTensor<Self>, EmbeddingError> {
        let client = grad.client.clone();
        let out = B::embedding_grad_sorted(
            fusion_in::<B>(grad),
            fusion_in_int::<B>(sorted_indices),
            fusion_in_int::<B>(permutation),
            counts.map(fusion_in_int::<B>),
            fusion_in::<B>(grad_weight),
            padding_idx,
        )?;
        fusion_out::<B>(out, &client)
    }

    fn embedding_renorm_sorted(
        weight: FloatTensor<Self>,
        sorted_indices: IntTensor<Self>,
        max_norm: f64,
        norm_type: f64,
    ) -> Result<FloatTensor<Self>, EmbeddingError> {
        let client = weight.client.clone();
        let out = B::embedding_renorm_sorted(
            fusion_in::<B>(weight),
            fusion_in_int::<B>(sorted_indices),
            max_norm,
            norm_type,
        )?;
        fusion_out::<B>(out, &client)
    }
}
