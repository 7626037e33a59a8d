use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::tensor::Samples;

/// Draws one uniform permutation and applies it to instances and labels
/// alike, so every (instance, label) pair stays together.
pub fn shuffle_samples<R: Rng + ?Sized>(samples: &mut Samples, rng: &mut R) {
    let mut permutation: Vec<usize> = (0..samples.len()).collect();
    permutation.shuffle(rng);
    *samples = samples.select(&permutation);
}
