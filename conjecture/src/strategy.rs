use crate::data::TestData;
use crate::errors::DrawResult;

/// A generator of values backed by test data bytes.
///
/// Strategies talk to the engine solely through the [`TestData`] handed to
/// `do_draw`; the engine never inspects the values they produce. Drawing
/// through [`TestData::draw`] brackets the strategy's byte consumption in
/// an example, giving the shrinker a structural landmark.
pub trait Strategy {
    type Value;

    fn do_draw(&self, data: &mut TestData) -> DrawResult<Self::Value>;
}
