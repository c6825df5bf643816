//! Seeded weight initialization for test and mock models.

/// Deterministic xorshift64 generator emitting small weights in [-0.1, 0.1).
pub(crate) struct WeightRng {
    state: u64,
}

impl WeightRng {
    pub(crate) fn new(seed: u64) -> Self {
        WeightRng {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub(crate) fn next_f32(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        ((self.state >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 0.2
    }

    pub(crate) fn fill(&mut self, n: usize) -> Vec<f32> {
        (0..n).map(|_| self.next_f32()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_weights() {
        let a = WeightRng::new(42).fill(16);
        let b = WeightRng::new(42).fill(16);
        assert_eq!(a, b);
    }

    #[test]
    fn weights_stay_small() {
        let values = WeightRng::new(7).fill(1000);
        assert!(values.iter().all(|v| v.abs() <= 0.1));
    }

    #[test]
    fn zero_seed_is_remapped() {
        let mut rng = WeightRng::new(0);
        assert!(rng.next_f32().abs() <= 0.1);
    }
}
