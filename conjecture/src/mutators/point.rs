use rand::{Rng, RngCore};

use super::{BufferMutator, MutatorError, MutatorResult};
use crate::data::TestData;

/// `PointMutator` perturbs one byte at a uniformly chosen consumed
/// position: flip a random bit, zero the byte, or saturate it.
pub struct PointMutator;

impl<R: RngCore> BufferMutator<R> for PointMutator {
    fn mutate(&self, data: &TestData, rng: &mut R) -> MutatorResult {
        let reachable = data.index().min(data.buffer().len());
        if reachable == 0 {
            return Err(MutatorError::NoMutationsAvailable);
        }
        let mut result = data.buffer().to_vec();
        let kind = rng.gen_range(0..3);
        let i = rng.gen_range(0..reachable);
        match kind {
            0 => {
                let bit = rng.gen_range(0..8u32);
                result[i] ^= 1 << bit;
            }
            1 => result[i] = 0,
            _ => result[i] = 255,
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "PointMutator"
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn changes_at_most_one_consumed_position() {
        let mut data = TestData::new(vec![10, 20, 30, 40]);
        data.draw_bytes(2).unwrap();
        data.freeze();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            let mutated = PointMutator.mutate(&data, &mut rng).unwrap();
            assert_eq!(mutated.len(), 4);
            let changed: Vec<usize> = (0..4).filter(|&i| mutated[i] != data.buffer()[i]).collect();
            assert!(changed.len() <= 1);
            assert!(changed.iter().all(|&i| i < 2));
        }
    }

    #[test]
    fn nothing_to_mutate_without_consumed_bytes() {
        let mut data = TestData::new(vec![1, 2]);
        data.freeze();
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(
            PointMutator.mutate(&data, &mut rng),
            Err(MutatorError::NoMutationsAvailable)
        );
    }
}
