use crate::common::*;

/// Pick the replacement index when a sample is rejected.
pub trait IndexSampler
where
    Self: Debug + Send + Sync,
{
    /// Return an index in `[0, len)`. `len` is always positive.
    fn sample_index(&self, rng: &mut dyn RngCore, len: usize) -> usize;
}

/// Draw replacement indices uniformly.
#[derive(Debug, Clone, Default)]
pub struct UniformIndexSampler;

impl IndexSampler for UniformIndexSampler {
    fn sample_index(&self, rng: &mut dyn RngCore, len: usize) -> usize {
        rng.gen_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_index_in_range() {
        let mut rng = StdRng::seed_from_u64(5);
        let sampler = UniformIndexSampler;
        let mut seen = [false; 4];
        for _ in 0..200 {
            let index = sampler.sample_index(&mut rng, 4);
            seen[index] = true;
        }
        assert!(seen.iter().all(|&hit| hit));
    }
}
