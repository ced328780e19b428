use std::cmp::Ordering;

use crate::data::{Status, TestData};
use crate::text_order::text_rank;

/// Decide whether a freshly frozen candidate replaces the current best.
///
/// Transition rules:
///   1. A transition never decreases the status.
///   2. Any transition that increases the status is accepted.
///   3. At equal status: invalid candidates must have consumed at least as
///      many bytes (they got further before being rejected), overrun
///      candidates at most as many (they failed sooner), valid candidates
///      always pass, and interesting candidates must make strict progress
///      under the shrink keys.
pub fn replaces(candidate: &TestData, best: &TestData) -> bool {
    if best.status() < candidate.status() {
        return true;
    }
    if best.status() > candidate.status() {
        return false;
    }
    match candidate.status() {
        Status::Invalid => candidate.index() >= best.index(),
        Status::Overrun => candidate.index() <= best.index(),
        Status::Interesting => strictly_better(candidate, best),
        Status::Valid => true,
    }
}

/// Strict progress for interesting data: the primary key must decrease and
/// the secondary key must not increase. Not a total order; what the
/// shrinker needs is that every accepted step shrinks the primary key.
fn strictly_better(candidate: &TestData, best: &TestData) -> bool {
    key1_cmp(candidate, best) == Ordering::Less
        && key2_cmp(candidate, best) != Ordering::Greater
}

/// Primary shrink key: buffer length, then buffer contents.
pub(crate) fn key1_cmp(a: &TestData, b: &TestData) -> Ordering {
    a.buffer()
        .len()
        .cmp(&b.buffer().len())
        .then_with(|| a.buffer().cmp(b.buffer()))
}

/// Secondary shrink key: cost vector, then output length, then output in
/// the canonical text order.
pub(crate) fn key2_cmp(a: &TestData, b: &TestData) -> Ordering {
    a.costs()
        .cmp(b.costs())
        .then(a.output().len().cmp(&b.output().len()))
        .then_with(|| {
            a.output()
                .iter()
                .map(|&byte| text_rank(byte))
                .cmp(b.output().iter().map(|&byte| text_rank(byte)))
        })
}
