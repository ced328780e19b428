use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::errors::{DataError, DrawResult};
use crate::strategy::Strategy;

/// Outcome of a single test execution, ordered worst to best.
///
/// A buffer that ran out of bytes is worse than one the test rejected,
/// which is worse than one that ran to completion, which is worse than one
/// exhibiting the behavior the caller is searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Overrun = 0,
    Invalid = 1,
    Valid = 2,
    Interesting = 3,
}

/// Identity of a [`TestData`], carried by stop signals so a driver can tell
/// its own data object's signal apart from a foreign one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataId(u64);

impl DataId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        DataId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where bytes come from once a draw runs past the end of the buffer.
enum ByteSource {
    /// The buffer is all there is; drawing past its end is an overrun.
    Replay,
    /// The buffer may grow up to `up_to` bytes, fed either by the rng or by
    /// the cache of previously drawn slices of the same length.
    Generate {
        rng: SmallRng,
        up_to: usize,
        duplication_rate: f64,
        words: HashMap<usize, Vec<Vec<u8>>>,
    },
}

/// The scratchpad for one test execution.
///
/// Strategies consume bytes from it on demand and report the outcome
/// through `mark_interesting` / `mark_invalid`; the engine freezes it once
/// the test function returns and compares it against the best execution
/// seen so far. Every draw and every example records an interval, the
/// structural landmarks the shrinker later cuts along.
pub struct TestData {
    id: DataId,
    buffer: Vec<u8>,
    index: usize,
    status: Status,
    frozen: bool,
    intervals: Vec<(usize, usize)>,
    interval_stack: Vec<usize>,
    costs: Vec<u64>,
    output: Vec<u8>,
    source: ByteSource,
}

impl TestData {
    /// A replay-mode data object: the buffer is all the test may consume.
    pub fn new(buffer: Vec<u8>) -> Self {
        Self::with_source(buffer, ByteSource::Replay, 0)
    }

    /// A generation-mode data object: draws past the end of `buffer` append
    /// bytes drawn from `rng`, until the total would exceed `up_to`.
    ///
    /// Some appended draws instead replay a previously drawn slice of the
    /// same length; how often is decided once per object, by sampling a
    /// duplication rate from `rng`.
    pub fn with_generation(buffer: Vec<u8>, up_to: usize, mut rng: SmallRng) -> Self {
        let duplication_rate = rng.gen_range(0.0..1.0);
        let source = ByteSource::Generate {
            rng,
            up_to,
            duplication_rate,
            words: HashMap::new(),
        };
        Self::with_source(buffer, source, up_to)
    }

    fn with_source(buffer: Vec<u8>, source: ByteSource, up_to: usize) -> Self {
        let costs = vec![0u64; up_to.max(buffer.len()) + 1];
        let mut data = Self {
            id: DataId::next(),
            buffer,
            index: 0,
            status: Status::Valid,
            frozen: false,
            intervals: Vec::new(),
            interval_stack: Vec::new(),
            costs,
            output: Vec::new(),
            source,
        };
        // The outermost example; closed implicitly by freeze.
        data.interval_stack.push(0);
        data
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes consumed so far. May exceed `buffer().len()` only on the data
    /// object whose final draw overran.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Spans of byte positions, one per draw and one per example that
    /// consumed bytes. Sorted by (length descending, start ascending) once
    /// frozen; in execution order before that.
    pub fn intervals(&self) -> &[(usize, usize)] {
        &self.intervals
    }

    pub fn costs(&self) -> &[u64] {
        &self.costs
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// True iff the test rejected this data or a draw overran.
    pub fn rejected(&self) -> bool {
        matches!(self.status, Status::Invalid | Status::Overrun)
    }

    fn check_not_frozen(&self, op: &'static str) -> DrawResult<()> {
        if self.frozen {
            return Err(DataError::Frozen(op));
        }
        Ok(())
    }

    /// Consume the next `n` bytes of the buffer.
    ///
    /// In replay mode a draw past the end of the buffer is an overrun: the
    /// data freezes and the stop signal unwinds the test. In generation
    /// mode the buffer grows to meet the draw until the extension budget is
    /// spent, after which the same overrun rule applies.
    pub fn draw_bytes(&mut self, n: usize) -> DrawResult<Vec<u8>> {
        self.check_not_frozen("draw_bytes")?;
        self.index += n;
        if self.index > self.buffer.len() && !self.extend_buffer(n) {
            self.status = Status::Overrun;
            self.freeze();
            return Err(DataError::Stop(self.id));
        }
        self.intervals.push((self.index - n, self.index));
        let result = self.buffer[self.index - n..self.index].to_vec();
        if let ByteSource::Generate { words, .. } = &mut self.source {
            words.entry(n).or_default().push(result.clone());
        }
        Ok(result)
    }

    /// Grow the buffer to cover a draw of `n` bytes ending at `index`.
    /// Returns false when there is no byte source or no budget left.
    fn extend_buffer(&mut self, n: usize) -> bool {
        let ByteSource::Generate {
            rng,
            up_to,
            duplication_rate,
            words,
        } = &mut self.source
        else {
            return false;
        };
        if self.index > *up_to {
            return false;
        }
        if self.index - n < self.buffer.len() {
            // The draw started inside the buffer; only the gap is fresh.
            let mut fresh = vec![0u8; self.index - self.buffer.len()];
            rng.fill_bytes(&mut fresh);
            self.buffer.extend_from_slice(&fresh);
            return true;
        }
        let reused = match words.get(&n) {
            Some(prior) if rng.gen_range(0.0..1.0) <= *duplication_rate => {
                prior.choose(rng).cloned()
            }
            _ => None,
        };
        match reused {
            Some(word) => self.buffer.extend_from_slice(&word),
            None => {
                let mut fresh = vec![0u8; n];
                rng.fill_bytes(&mut fresh);
                self.buffer.extend_from_slice(&fresh);
            }
        }
        true
    }

    /// Open an example spanning the draws made until the matching
    /// `stop_example`.
    pub fn start_example(&mut self) -> DrawResult<()> {
        self.check_not_frozen("start_example")?;
        self.interval_stack.push(self.index);
        Ok(())
    }

    /// Close the innermost open example, recording its span as an interval
    /// if it consumed any bytes.
    pub fn stop_example(&mut self) -> DrawResult<()> {
        self.check_not_frozen("stop_example")?;
        self.close_example();
        Ok(())
    }

    fn close_example(&mut self) {
        let start = self
            .interval_stack
            .pop()
            .expect("stop_example without matching start_example");
        if start != self.index {
            let interval = (start, self.index);
            if self.intervals.last() != Some(&interval) {
                self.intervals.push(interval);
            }
        }
    }

    /// Charge `cost` against the current position. Costs weigh into which
    /// of two equally interesting executions is preferred.
    pub fn incur_cost(&mut self, cost: u64) -> DrawResult<()> {
        self.check_not_frozen("incur_cost")?;
        self.costs[self.index] += cost;
        Ok(())
    }

    /// Append a debug note to the output log.
    pub fn note<T: fmt::Display>(&mut self, value: T) -> DrawResult<()> {
        self.check_not_frozen("note")?;
        self.output.extend_from_slice(value.to_string().as_bytes());
        Ok(())
    }

    /// Draw a value from `strategy`, bracketed in its own example.
    pub fn draw<S: Strategy>(&mut self, strategy: &S) -> DrawResult<S::Value> {
        self.start_example()?;
        let value = strategy.do_draw(self)?;
        self.stop_example()?;
        Ok(value)
    }

    /// Record that this execution exhibits the searched-for behavior and
    /// stop the test. Only upgrades a still-valid execution.
    pub fn mark_interesting(&mut self) -> DrawResult<()> {
        self.check_not_frozen("mark_interesting")?;
        if self.status == Status::Valid {
            self.status = Status::Interesting;
        }
        Err(DataError::Stop(self.id))
    }

    /// Reject this execution and stop the test. An overrun is never
    /// downgraded to invalid.
    pub fn mark_invalid(&mut self) -> DrawResult<()> {
        self.check_not_frozen("mark_invalid")?;
        if self.status != Status::Overrun {
            self.status = Status::Invalid;
        }
        Err(DataError::Stop(self.id))
    }

    /// Seal the data object. Idempotent. Closes the outermost example,
    /// sorts the intervals longest first (ties by start), and truncates the
    /// buffer to the consumed prefix when the execution was interesting.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.close_example();
        self.frozen = true;
        self.intervals
            .sort_by_key(|&(start, end)| (Reverse(end - start), start));
        if self.status == Status::Interesting {
            self.buffer.truncate(self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn draws_consume_the_buffer_in_order() {
        let mut data = TestData::new(vec![1, 2, 3, 4]);
        assert_eq!(data.draw_bytes(2).unwrap(), [1, 2]);
        assert_eq!(data.draw_bytes(2).unwrap(), [3, 4]);
        assert_eq!(data.index(), 4);
        assert_eq!(data.intervals(), [(0, 2), (2, 4)]);
    }

    #[test]
    fn overrunning_a_replay_buffer_freezes_with_a_stop_signal() {
        let mut data = TestData::new(vec![9]);
        assert_eq!(data.draw_bytes(2), Err(DataError::Stop(data.id())));
        assert_eq!(data.status(), Status::Overrun);
        assert!(data.is_frozen());
    }

    #[test]
    fn frozen_data_rejects_mutating_operations() {
        let mut data = TestData::new(vec![1, 2]);
        data.freeze();
        assert_eq!(data.draw_bytes(1), Err(DataError::Frozen("draw_bytes")));
        assert_eq!(
            data.start_example(),
            Err(DataError::Frozen("start_example"))
        );
        assert_eq!(data.note("x"), Err(DataError::Frozen("note")));
    }

    #[test]
    fn freeze_is_idempotent() {
        let mut data = TestData::new(vec![1, 2]);
        data.draw_bytes(1).unwrap();
        data.freeze();
        let intervals = data.intervals().to_vec();
        data.freeze();
        assert_eq!(data.intervals(), intervals);
        assert_eq!(data.status(), Status::Valid);
    }

    #[test]
    fn interesting_data_truncates_to_the_consumed_prefix() {
        let mut data = TestData::new(vec![7, 8, 9]);
        data.draw_bytes(1).unwrap();
        assert_eq!(data.mark_interesting(), Err(DataError::Stop(data.id())));
        data.freeze();
        assert_eq!(data.buffer(), [7]);
        assert_eq!(data.index(), data.buffer().len());
    }

    #[test]
    fn intervals_sort_longest_first_at_freeze() {
        let mut data = TestData::new(vec![1, 2, 3]);
        data.start_example().unwrap();
        data.draw_bytes(1).unwrap();
        data.draw_bytes(1).unwrap();
        data.stop_example().unwrap();
        data.draw_bytes(1).unwrap();
        data.freeze();
        assert_eq!(data.intervals(), [(0, 3), (0, 2), (0, 1), (1, 2), (2, 3)]);
        for &(start, end) in data.intervals() {
            assert!(start <= end && end <= data.index());
        }
    }

    #[test]
    fn an_example_that_repeats_the_last_interval_is_dropped() {
        let mut data = TestData::new(vec![1, 2]);
        data.start_example().unwrap();
        data.draw_bytes(2).unwrap();
        data.stop_example().unwrap();
        assert_eq!(data.intervals(), [(0, 2)]);
    }

    #[test]
    fn empty_examples_record_no_interval() {
        let mut data = TestData::new(vec![1]);
        data.start_example().unwrap();
        data.stop_example().unwrap();
        assert!(data.intervals().is_empty());
    }

    #[test]
    fn generation_mode_extends_the_buffer_up_to_the_budget() {
        let rng = SmallRng::seed_from_u64(0);
        let mut data = TestData::with_generation(Vec::new(), 8, rng);
        assert_eq!(data.draw_bytes(4).unwrap().len(), 4);
        assert_eq!(data.buffer().len(), 4);
        assert_eq!(data.draw_bytes(4).unwrap().len(), 4);
        assert_eq!(data.buffer().len(), 8);
        let id = data.id();
        assert_eq!(data.draw_bytes(1), Err(DataError::Stop(id)));
        assert_eq!(data.status(), Status::Overrun);
    }

    #[test]
    fn generation_mode_records_every_draw_in_the_word_cache() {
        let rng = SmallRng::seed_from_u64(3);
        let mut data = TestData::with_generation(Vec::new(), 16, rng);
        data.draw_bytes(4).unwrap();
        data.draw_bytes(4).unwrap();
        data.draw_bytes(2).unwrap();
        let ByteSource::Generate { words, .. } = &data.source else {
            panic!("generation mode expected");
        };
        assert_eq!(words[&4].len(), 2);
        assert_eq!(words[&2].len(), 1);
    }

    #[test]
    fn generation_mode_fills_a_partial_gap_with_fresh_bytes() {
        let rng = SmallRng::seed_from_u64(5);
        let mut data = TestData::with_generation(vec![1, 2, 3], 8, rng);
        data.draw_bytes(2).unwrap();
        // Starts inside the buffer, ends one byte past it.
        assert_eq!(data.draw_bytes(2).unwrap()[0], 3);
        assert_eq!(data.buffer().len(), 4);
    }

    #[test]
    fn costs_cover_every_reachable_position() {
        let data = TestData::new(vec![0; 3]);
        assert_eq!(data.costs().len(), 4);
        let generated =
            TestData::with_generation(Vec::new(), 8, SmallRng::seed_from_u64(0));
        assert_eq!(generated.costs().len(), 9);
    }

    #[test]
    fn incurred_costs_land_on_the_current_position() {
        let mut data = TestData::new(vec![1, 2]);
        data.draw_bytes(1).unwrap();
        data.incur_cost(3).unwrap();
        data.incur_cost(2).unwrap();
        assert_eq!(data.costs(), [0, 5, 0]);
    }

    #[test]
    fn notes_append_to_the_output_log() {
        let mut data = TestData::new(vec![]);
        data.note("ab").unwrap();
        data.note(17).unwrap();
        assert_eq!(data.output(), b"ab17");
    }

    #[test]
    fn an_overrun_is_final() {
        let mut data = TestData::new(vec![]);
        assert!(data.draw_bytes(1).is_err());
        assert_eq!(data.status(), Status::Overrun);
        assert!(data.rejected());
        // The overrun froze the data, so no later mark can touch it.
        assert_eq!(
            data.mark_invalid(),
            Err(DataError::Frozen("mark_invalid"))
        );
        assert_eq!(data.status(), Status::Overrun);
    }

    #[test]
    fn draw_wraps_a_strategy_in_an_example() {
        struct PairStrategy;

        impl Strategy for PairStrategy {
            type Value = (u8, u8);

            fn do_draw(&self, data: &mut TestData) -> DrawResult<(u8, u8)> {
                let first = data.draw_bytes(1)?[0];
                let second = data.draw_bytes(1)?[0];
                Ok((first, second))
            }
        }

        let mut data = TestData::new(vec![4, 5, 6]);
        assert_eq!(data.draw(&PairStrategy).unwrap(), (4, 5));
        // The example span (0, 2) came from the wrapping draw.
        assert_eq!(data.intervals(), [(0, 1), (1, 2), (0, 2)]);
    }
}
