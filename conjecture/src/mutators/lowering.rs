use rand::{Rng, RngCore};

use super::{BufferMutator, MutatorError, MutatorResult};
use crate::data::TestData;

/// `LoweringMutator` recovers from an overrun best: each byte is kept,
/// zeroed, or redrawn uniformly from `[0, c]`, nudging the buffer toward
/// one whose replay consumes fewer bytes.
pub struct LoweringMutator;

impl<R: RngCore> BufferMutator<R> for LoweringMutator {
    fn mutate(&self, data: &TestData, rng: &mut R) -> MutatorResult {
        if data.buffer().is_empty() {
            return Err(MutatorError::NoMutationsAvailable);
        }
        let mut result = data.buffer().to_vec();
        for i in 0..result.len() {
            match rng.gen_range(0..3) {
                0 => result[i] = 0,
                1 => result[i] = rng.gen_range(0..=result[i]),
                _ => {}
            }
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "LoweringMutator"
    }
}
