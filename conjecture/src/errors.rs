use std::fmt;

use crate::data::DataId;

/// Reason a data-object operation refused to continue the current test.
///
/// `Stop` is not a failure: it is how a [`TestData`](crate::data::TestData)
/// unwinds the test function once the outcome of the execution has been
/// decided (the test marked the data interesting or invalid, or a draw
/// overran the buffer). The driver consumes a `Stop` carrying the id of the
/// data object it is currently running and surfaces any other. `Frozen` is
/// a programmer error: a mutating operation was called after `freeze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataError {
    Stop(DataId),
    Frozen(&'static str),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Stop(id) => write!(f, "test execution stopped for data {}", id),
            DataError::Frozen(op) => write!(f, "cannot call {} on frozen TestData", op),
        }
    }
}

impl std::error::Error for DataError {}

pub type DrawResult<T> = std::result::Result<T, DataError>;
