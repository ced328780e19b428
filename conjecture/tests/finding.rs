use std::time::Duration;

use conjecture::{
    DrawResult, Settings, Status, Strategy, TestData, TestRunner, find_interesting_buffer,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Budgets large enough that the searches below cannot plausibly fail to
/// find their target; the assertions are on the shrunk result, not on how
/// fast the search got there.
fn generous() -> Settings {
    Settings {
        buffer_size: 64,
        max_examples: 50_000,
        max_iterations: 200_000,
        max_shrinks: 10_000,
        timeout: Duration::ZERO,
        ..Settings::default()
    }
}

fn run_to_best<F>(test: F, settings: Settings, seed: u64) -> TestRunner<F>
where
    F: FnMut(&mut TestData) -> DrawResult<()>,
{
    let mut runner = TestRunner::with_rng(test, settings, SmallRng::seed_from_u64(seed));
    runner.run().unwrap();
    runner
}

#[test]
fn first_byte_condition_shrinks_to_the_boundary_value() {
    init_logging();
    let runner = run_to_best(
        |data: &mut TestData| {
            let byte = data.draw_bytes(1)?[0];
            if byte >= 5 {
                data.mark_interesting()
            } else {
                data.mark_invalid()
            }
        },
        generous(),
        17,
    );
    let best = runner.best().unwrap();
    assert_eq!(best.status(), Status::Interesting);
    assert_eq!(best.buffer(), [5]);
    assert_eq!(best.index(), best.buffer().len());
}

#[test]
fn sum_of_two_bytes_shrinks_to_zero_then_the_sum() {
    init_logging();
    let runner = run_to_best(
        |data: &mut TestData| {
            let first = data.draw_bytes(1)?[0];
            let second = data.draw_bytes(1)?[0];
            if u32::from(first) + u32::from(second) >= 10 {
                data.mark_interesting()
            } else {
                data.mark_invalid()
            }
        },
        generous(),
        3,
    );
    let best = runner.best().unwrap();
    assert_eq!(best.status(), Status::Interesting);
    assert_eq!(best.buffer(), [0, 10]);
}

/// Stop-byte encoded list: an odd byte announces one more element, an even
/// byte ends the list.
struct ByteListStrategy;

impl Strategy for ByteListStrategy {
    type Value = Vec<u8>;

    fn do_draw(&self, data: &mut TestData) -> DrawResult<Vec<u8>> {
        let mut elements = Vec::new();
        loop {
            data.start_example()?;
            let more = data.draw_bytes(1)?[0];
            if more & 1 == 0 {
                data.stop_example()?;
                break;
            }
            let element = data.draw_bytes(1)?[0];
            data.stop_example()?;
            elements.push(element);
        }
        Ok(elements)
    }
}

#[test]
fn a_list_containing_a_marker_shrinks_to_a_single_element() {
    init_logging();
    let runner = run_to_best(
        |data: &mut TestData| {
            let elements = data.draw(&ByteListStrategy)?;
            if elements.contains(&255) {
                data.mark_interesting()
            } else {
                data.mark_invalid()
            }
        },
        generous(),
        99,
    );
    let best = runner.best().unwrap();
    assert_eq!(best.status(), Status::Interesting);
    // One continue byte, the marker element, one stop byte.
    assert_eq!(best.buffer(), [1, 255, 0]);

    // Replaying the shrunk buffer decodes to exactly the marker.
    let mut replay = TestData::new(best.buffer().to_vec());
    assert_eq!(replay.draw(&ByteListStrategy).unwrap(), [255]);
}

#[test]
fn an_equal_nonzero_pair_shrinks_to_ones_in_a_sorted_buffer() {
    init_logging();
    let settings = Settings {
        buffer_size: 5,
        max_iterations: 500_000,
        ..generous()
    };
    let runner = run_to_best(
        |data: &mut TestData| {
            let bytes = data.draw_bytes(5)?;
            let has_pair = (0..5).any(|j| {
                (j + 1..5).any(|k| bytes[j] == bytes[k] && bytes[j] != 0)
            });
            if has_pair {
                data.mark_interesting()
            } else {
                data.mark_invalid()
            }
        },
        settings,
        7,
    );
    let best = runner.best().unwrap();
    assert_eq!(best.status(), Status::Interesting);
    // The pair is driven down to ones and the sorting passes push the
    // zeros to the front, so the witness is the sorted representative.
    assert_eq!(best.buffer(), [0, 0, 0, 1, 1]);
}

#[test]
fn a_test_that_is_never_interesting_exhausts_the_iteration_budget() {
    init_logging();
    let settings = Settings {
        max_iterations: 100,
        timeout: Duration::ZERO,
        ..Settings::default()
    };
    let runner = run_to_best(
        |data: &mut TestData| data.mark_invalid(),
        settings.clone(),
        1,
    );
    assert_eq!(runner.best().unwrap().status(), Status::Invalid);
    assert_eq!(runner.valid_examples, 0);
    assert_eq!(runner.examples_considered, 100);

    let found =
        find_interesting_buffer(|data: &mut TestData| data.mark_invalid(), settings).unwrap();
    assert_eq!(found, None);
}

#[test]
fn a_test_that_is_immediately_interesting_shrinks_to_the_empty_buffer() {
    init_logging();
    let found = find_interesting_buffer(
        |data: &mut TestData| data.mark_interesting(),
        Settings {
            timeout: Duration::ZERO,
            ..Settings::default()
        },
    )
    .unwrap();
    assert_eq!(found, Some(Vec::new()));
}

#[test]
fn a_fixed_seed_reproduces_the_whole_search() {
    init_logging();
    let run = |seed: u64| {
        let runner = run_to_best(
            |data: &mut TestData| {
                let first = data.draw_bytes(1)?[0];
                let second = data.draw_bytes(1)?[0];
                if u32::from(first) + u32::from(second) >= 10 {
                    data.mark_interesting()
                } else {
                    data.mark_invalid()
                }
            },
            generous(),
            seed,
        );
        (
            runner.best().unwrap().buffer().to_vec(),
            runner.examples_considered,
            runner.valid_examples,
            runner.changed,
            runner.shrinks,
        )
    };
    assert_eq!(run(23), run(23));
}
