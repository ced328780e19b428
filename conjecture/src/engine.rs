use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::data::{Status, TestData};
use crate::errors::{DataError, DrawResult};
use crate::mutators::{
    BufferMutator, LoweringMutator, MutatorError, PointMutator, SpliceMutator,
};
use crate::ordering;
use crate::settings::Settings;

/// Why the driver unwound early: either the run hit a budget or the
/// timeout, or a data-object fault must surface to the caller.
#[derive(Debug)]
pub(crate) enum Interrupt {
    RunIsComplete,
    Fault(DataError),
}

impl From<DataError> for Interrupt {
    fn from(error: DataError) -> Self {
        Interrupt::Fault(error)
    }
}

pub(crate) type StepResult<T> = Result<T, Interrupt>;

/// The engine driver: searches for a buffer the test function finds
/// interesting, then shrinks it.
///
/// One data object is live at a time; every candidate buffer flows through
/// [`TestRunner::incorporate_new_buffer`], which runs the test, freezes the
/// data and consults the acceptance ordering against the best so far.
pub struct TestRunner<F> {
    test: F,
    pub settings: Settings,
    rng: SmallRng,
    last_data: Option<TestData>,
    /// Accepted transitions of the best data, shrinking or otherwise.
    pub changed: u64,
    /// Accepted shrinks, i.e. transitions away from an interesting best.
    pub shrinks: u64,
    /// Buffers fed through the acceptance pipeline.
    pub examples_considered: u64,
    /// Executions that ran to a valid-or-better outcome.
    pub valid_examples: u64,
    start_time: Instant,
}

impl<F> TestRunner<F>
where
    F: FnMut(&mut TestData) -> DrawResult<()>,
{
    pub fn new(test: F, settings: Settings) -> Self {
        Self::with_rng(test, settings, SmallRng::from_entropy())
    }

    /// A runner with a caller-provided generator. The generator is the only
    /// source of nondeterminism, so a fixed seed reproduces the whole
    /// search trajectory bit for bit.
    pub fn with_rng(test: F, settings: Settings, rng: SmallRng) -> Self {
        Self {
            test,
            settings,
            rng,
            last_data: None,
            changed: 0,
            shrinks: 0,
            examples_considered: 0,
            valid_examples: 0,
            start_time: Instant::now(),
        }
    }

    /// The best data seen so far, if any execution has completed.
    pub fn best(&self) -> Option<&TestData> {
        self.last_data.as_ref()
    }

    pub(crate) fn best_data(&self) -> &TestData {
        self.last_data
            .as_ref()
            .expect("an execution has completed before any comparison")
    }

    /// Run the search to completion. Budget exhaustion and timeouts are
    /// normal termination; a frozen violation or a stop signal from a
    /// foreign data object surfaces as an error.
    pub fn run(&mut self) -> Result<(), DataError> {
        match self.search() {
            Ok(()) | Err(Interrupt::RunIsComplete) => Ok(()),
            Err(Interrupt::Fault(error)) => Err(error),
        }
    }

    fn search(&mut self) -> StepResult<()> {
        self.new_buffer()?;
        let mut mutations = 0;
        while self.best_data().status() != Status::Interesting {
            if self.valid_examples >= self.settings.max_examples
                || self.examples_considered >= self.settings.max_iterations
            {
                return Ok(());
            }
            if mutations >= self.settings.max_mutations {
                mutations = 0;
                self.new_buffer()?;
            } else {
                let candidate = self.mutate_best_buffer();
                self.incorporate_new_buffer(candidate)?;
            }
            mutations += 1;
        }
        self.shrink()
    }

    /// Run the test on a fresh random buffer and make it the new best,
    /// whatever its outcome.
    fn new_buffer(&mut self) -> StepResult<()> {
        let buffer = self.rand_bytes(self.settings.buffer_size);
        let mut data = TestData::new(buffer);
        self.run_test(&mut data)?;
        data.freeze();
        self.last_data = Some(data);
        Ok(())
    }

    /// Invoke the test function, consuming the stop signal of the data
    /// object it was handed. Any other signal is a fault.
    fn run_test(&mut self, data: &mut TestData) -> Result<(), DataError> {
        match (self.test)(data) {
            Ok(()) => Ok(()),
            Err(DataError::Stop(id)) if id == data.id() => Ok(()),
            Err(error) => Err(error),
        }
    }

    /// Run the test on `buffer` and replace the best if the outcome is an
    /// improvement under the acceptance ordering. Returns whether it was.
    pub(crate) fn incorporate_new_buffer(&mut self, buffer: Vec<u8>) -> StepResult<bool> {
        let timeout = self.settings.timeout;
        if !timeout.is_zero() && self.start_time.elapsed() >= timeout {
            return Err(Interrupt::RunIsComplete);
        }
        self.examples_considered += 1;
        if same_draw_prefix(&buffer, self.best_data()) {
            return Ok(false);
        }
        let mut data = TestData::new(buffer);
        self.run_test(&mut data)?;
        data.freeze();
        if data.status() >= self.best_data().status() {
            log::debug!(
                "{:?} -> {:?}, {}",
                &data.buffer()[..data.index().min(data.buffer().len())],
                data.status(),
                String::from_utf8_lossy(data.output()),
            );
        }
        if data.status() >= Status::Valid {
            self.valid_examples += 1;
        }
        if ordering::replaces(&data, self.best_data()) {
            if self.best_data().status() == Status::Interesting {
                self.shrinks += 1;
            }
            self.last_data = Some(data);
            self.changed += 1;
            if self.shrinks >= self.settings.max_shrinks {
                return Err(Interrupt::RunIsComplete);
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Derive a candidate buffer from the best one. Overrun bests are
    /// lowered byte by byte; otherwise most candidates are point
    /// mutations, with the occasional interval splice once the best has
    /// enough structure.
    fn mutate_best_buffer(&mut self) -> Vec<u8> {
        let best = self
            .last_data
            .as_ref()
            .expect("an execution has completed before mutation");
        let reachable = best.index().min(best.buffer().len());
        if reachable == 0 {
            return Vec::new();
        }
        if reachable == 1 {
            return self.rand_bytes(1);
        }
        let mutator: &dyn BufferMutator<SmallRng> = if best.status() == Status::Overrun {
            &LoweringMutator
        } else {
            let probe: u8 = self.rng.gen_range(0..=255);
            if probe <= 200 || best.intervals().len() <= 1 {
                &PointMutator
            } else {
                &SpliceMutator
            }
        };
        log::trace!("mutating with {}", mutator.name());
        match mutator.mutate(best, &mut self.rng) {
            Ok(candidate) => candidate,
            Err(MutatorError::NoMutationsAvailable) => self.rand_bytes(reachable),
        }
    }

    pub(crate) fn rand_bytes(&mut self, n: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; n];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }
}

/// A candidate that agrees with the best buffer on every byte the best
/// execution consumed would replay the exact same draws; skip running it.
fn same_draw_prefix(buffer: &[u8], best: &TestData) -> bool {
    let consumed = best.index();
    let best_prefix = &best.buffer()[..consumed.min(best.buffer().len())];
    let candidate_prefix = &buffer[..consumed.min(buffer.len())];
    candidate_prefix == best_prefix
}

/// Search for, then shrink, a buffer on which `test` marks its data
/// interesting. Returns the minimized buffer, or `None` if no interesting
/// execution was found within the budgets.
pub fn find_interesting_buffer<F>(
    test: F,
    settings: Settings,
) -> Result<Option<Vec<u8>>, DataError>
where
    F: FnMut(&mut TestData) -> DrawResult<()>,
{
    let mut runner = TestRunner::new(test, settings);
    runner.run()?;
    Ok(runner
        .best()
        .filter(|data| data.status() == Status::Interesting)
        .map(|data| data.buffer().to_vec()))
}
