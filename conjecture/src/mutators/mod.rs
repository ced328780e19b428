pub mod lowering;
pub mod point;
pub mod splice;

pub use lowering::*;
pub use point::*;
pub use splice::*;

use rand::RngCore;

use crate::data::TestData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorError {
    NoMutationsAvailable,
}

pub type MutatorResult = Result<Vec<u8>, MutatorError>;

/// A `BufferMutator` derives a candidate buffer from the current best
/// data. Mutators never run the test themselves; the driver feeds their
/// output through the acceptance pipeline.
pub trait BufferMutator<R: RngCore> {
    fn mutate(&self, data: &TestData, rng: &mut R) -> MutatorResult;
    fn name(&self) -> &'static str;
}
