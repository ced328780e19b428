use rand::{Rng, RngCore};

use super::{BufferMutator, MutatorError, MutatorResult};
use crate::data::TestData;

/// `SpliceMutator` replaces the span of one interval with the bytes of a
/// later, distinct interval, using the frozen interval list as structural
/// landmarks.
pub struct SpliceMutator;

impl<R: RngCore> BufferMutator<R> for SpliceMutator {
    fn mutate(&self, data: &TestData, rng: &mut R) -> MutatorResult {
        let intervals = data.intervals();
        if intervals.len() < 2 {
            return Err(MutatorError::NoMutationsAvailable);
        }
        // Adjacent duplicates are pruned at record time, so some distinct
        // pair of spans always exists.
        let (target, source) = loop {
            let i = rng.gen_range(0..intervals.len() - 1);
            let j = rng.gen_range(i + 1..intervals.len());
            if intervals[i] != intervals[j] {
                break (intervals[i], intervals[j]);
            }
        };
        let buffer = data.buffer();
        let mut result =
            Vec::with_capacity(buffer.len() - (target.1 - target.0) + (source.1 - source.0));
        result.extend_from_slice(&buffer[..target.0]);
        result.extend_from_slice(&buffer[source.0..source.1]);
        result.extend_from_slice(&buffer[target.1..]);
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "SpliceMutator"
    }
}
