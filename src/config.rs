use burn::config::Config;

// Central backend type aliases - selected via feature flags (rocm, cuda, wgpu)
#[cfg(feature = "rocm")]
pub type GpuBackend = burn::backend::Rocm<f32>;

#[cfg(all(feature = "cuda", not(feature = "rocm")))]
pub type GpuBackend = burn::backend::Cuda<f32>;

#[cfg(all(feature = "wgpu", not(any(feature = "rocm", feature = "cuda"))))]
pub type GpuBackend = burn::backend::Wgpu;

#[cfg(not(any(feature = "rocm", feature = "cuda", feature = "wgpu")))]
pub type GpuBackend =
    compile_error!("One of the features 'rocm', 'cuda', or 'wgpu' must be enabled");

/// Batches with at most this many indices take the direct path by default.
pub const DEFAULT_DIRECT_THRESHOLD: usize = 768;

/// How duplicate destination rows are merged during gradient accumulation.
#[allow(clippy::expl_impl_clone_on_copy)]
#[derive(Config, Debug, PartialEq, Copy)]
pub enum AccumulationStrategy {
    /// One cube per feature tile sweeps the whole batch, merging duplicates
    /// inside each sub-chunk through leader election.
    Direct,
    /// Indices are sorted first; the first position of every duplicate run owns
    /// the run and writes its row once.
    SortGrouped,
}

impl AccumulationStrategy {
    /// Picks the strategy for a batch of `num_indices` selections.
    ///
    /// A strategy pinned in `config` wins; otherwise small batches without
    /// frequency scaling go direct and everything else is sorted.
    #[must_use]
    pub fn select(num_indices: usize, config: &EmbeddingGradConfig) -> Self {
        if let Some(strategy) = config.strategy {
            return strategy;
        }
        if num_indices <= config.direct_threshold && !config.scale_grad_by_freq {
            Self::Direct
        } else {
            Self::SortGrouped
        }
    }
}

/// Configuration for gradient accumulation into an embedding table.
#[derive(Config, Debug)]
pub struct EmbeddingGradConfig {
    /// Number of rows in the embedding table.
    pub num_weights: usize,
    /// Row whose contributions are discarded. Stays all-zero in the result.
    pub padding_idx: Option<usize>,
    /// Divide every contribution by how often its row occurs in the batch.
    #[config(default = false)]
    pub scale_grad_by_freq: bool,
    /// Largest batch that still uses the direct path.
    #[config(default = "DEFAULT_DIRECT_THRESHOLD")]
    pub direct_threshold: usize,
    /// Force a strategy instead of choosing by batch size.
    pub strategy: Option<AccumulationStrategy>,
}

/// Configuration for clipping the norm of selected embedding rows.
#[derive(Config, Debug)]
pub struct RenormConfig {
    /// Upper bound on the p-norm of every selected row.
    pub max_norm: f64,
    /// The order `p` of the norm. 1 and 2 take dedicated paths.
    #[config(default = 2.0)]
    pub norm_type: f64,
}
