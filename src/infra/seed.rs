use burn::tensor::backend::Backend;
use rand::{rngs::StdRng, SeedableRng};

/// Seed the tensor backend's generator and return a host-side
/// generator derived from the same seed. Everything stochastic in
/// a run (weight init, dropout, negative sampling, loader
/// shuffling) draws from one of the two.
pub fn seed_everything<B: Backend>(seed: u64) -> StdRng {
    B::seed(seed);
    tracing::info!("Global seed set to {}", seed);
    host_rng(seed)
}

pub fn host_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
