use crate::errors::{BenchError, Result};
use ndarray::{Array, Dimension};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// fixed seed for reproducible runs, entropy otherwise
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// x + N(0, magnitude * |x|) element-wise; the input is left untouched
pub fn add_relative_noise<D: Dimension>(
    field: &Array<f64, D>,
    magnitude: f64,
    rng: &mut StdRng,
) -> Result<Array<f64, D>> {
    if !magnitude.is_finite() || magnitude < 0.0 {
        return Err(BenchError::NegativeNoiseMagnitude(magnitude));
    }
    if magnitude == 0.0 {
        return Ok(field.clone());
    }
    Ok(field.mapv(|x| {
        let z: f64 = StandardNormal.sample(&mut *rng);
        x + magnitude * x.abs() * z
    }))
}
