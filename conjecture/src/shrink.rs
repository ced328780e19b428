//! The shrink-pass library: deterministic transformations applied to the
//! interesting best buffer until no pass makes progress.
//!
//! Every accepted step strictly reduces the primary shrink key (buffer
//! length, then contents), which is well ordered, so the whole process
//! terminates. Progress is observed through the runner's `changed`
//! counter; passes reread the best buffer after every acceptance because
//! it is the accepted candidate from that point on.

use crate::data::{Status, TestData};
use crate::engine::{StepResult, TestRunner};
use crate::errors::DrawResult;

/// `buffer` with `start..end` replaced by `replacement`.
fn splice(buffer: &[u8], start: usize, end: usize, replacement: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(buffer.len() - (end - start) + replacement.len());
    result.extend_from_slice(&buffer[..start]);
    result.extend_from_slice(replacement);
    result.extend_from_slice(&buffer[end..]);
    result
}

impl<F> TestRunner<F>
where
    F: FnMut(&mut TestData) -> DrawResult<()>,
{
    /// Shrink the interesting best until a full round of passes makes no
    /// progress or the shrink budget is spent.
    ///
    /// The cheap structural passes run every round; the expensive pairwise
    /// passes only run once a round has otherwise stalled.
    pub(crate) fn shrink(&mut self) -> StepResult<()> {
        self.clamp_bytes()?;

        let initial_changes = self.changed;
        loop {
            debug_assert_eq!(self.best_data().status(), Status::Interesting);
            let round_start = self.changed;
            self.delete_intervals()?;
            self.sort_intervals()?;
            self.replace_duplicate_bytes()?;
            self.zero_windows()?;
            self.delete_or_lower_bytes()?;
            self.sort_adjacent_bytes()?;
            if self.changed == round_start {
                self.borrow_down()?;
            }
            if self.changed == round_start {
                self.lower_duplicate_pairs()?;
            }
            if self.changed == round_start {
                self.sort_and_lower_pairs()?;
            }
            if self.changed == round_start
                || self.changed > initial_changes.saturating_add(self.settings.max_shrinks)
            {
                return Ok(());
            }
        }
    }

    /// Clamp every byte to a ceiling, keeping the first ceiling that still
    /// produces an interesting execution.
    fn clamp_bytes(&mut self) -> StepResult<()> {
        for ceiling in 0..=255u8 {
            let clamped: Vec<u8> = self
                .best_data()
                .buffer()
                .iter()
                .map(|&b| b.min(ceiling))
                .collect();
            if self.incorporate_new_buffer(clamped)? {
                break;
            }
        }
        Ok(())
    }

    /// Delete whole intervals. The list is sorted longest first, so large
    /// deletions are attempted early; a successful deletion keeps the
    /// cursor in place because the list now describes the new best.
    fn delete_intervals(&mut self) -> StepResult<()> {
        let mut previous = None;
        while previous != Some(self.changed) {
            previous = Some(self.changed);
            let mut i = 0;
            while i < self.best_data().intervals().len() {
                let (start, end) = self.best_data().intervals()[i];
                let candidate = splice(self.best_data().buffer(), start, end, &[]);
                if !self.incorporate_new_buffer(candidate)? {
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// Replace each interval's span with its byte-sorted form.
    fn sort_intervals(&mut self) -> StepResult<()> {
        let mut i = 0;
        while i < self.best_data().intervals().len() {
            let (start, end) = self.best_data().intervals()[i];
            let buffer = self.best_data().buffer();
            let mut span = buffer[start..end].to_vec();
            span.sort_unstable();
            let candidate = splice(buffer, start, end, &span);
            self.incorporate_new_buffer(candidate)?;
            i += 1;
        }
        Ok(())
    }

    /// For every byte value occurring more than once, lower all of its
    /// occurrences together; after a success, chase the new value further
    /// down through every smaller replacement.
    fn replace_duplicate_bytes(&mut self) -> StepResult<()> {
        let mut previous = None;
        while previous != Some(self.changed) {
            previous = Some(self.changed);
            for value in 1..=255u8 {
                let buffer = self.best_data().buffer().to_vec();
                if buffer.iter().filter(|&&b| b == value).count() <= 1 {
                    continue;
                }
                let lowered: Vec<u8> = buffer
                    .iter()
                    .map(|&b| if b == value { value - 1 } else { b })
                    .collect();
                if self.incorporate_new_buffer(lowered)? {
                    let buffer = self.best_data().buffer().to_vec();
                    for replacement in 0..value {
                        let candidate: Vec<u8> = buffer
                            .iter()
                            .map(|&b| if b == value - 1 { replacement } else { b })
                            .collect();
                        if self.incorporate_new_buffer(candidate)? {
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Zero out sliding windows of eight bytes.
    fn zero_windows(&mut self) -> StepResult<()> {
        const WINDOW: usize = 8;
        let positions = self.best_data().buffer().len().saturating_sub(WINDOW);
        for i in 0..positions {
            let buffer = self.best_data().buffer();
            if i + WINDOW > buffer.len() {
                break;
            }
            let candidate = splice(buffer, i, i + WINDOW, &[0; WINDOW]);
            self.incorporate_new_buffer(candidate)?;
        }
        Ok(())
    }

    /// Try deleting each byte; failing that, replace it with each smaller
    /// value, and after each refused replacement retry with a random tail
    /// as an escape from local minima.
    fn delete_or_lower_bytes(&mut self) -> StepResult<()> {
        let mut i = 0;
        while i < self.best_data().buffer().len() {
            let buffer = self.best_data().buffer().to_vec();
            let deleted = splice(&buffer, i, i + 1, &[]);
            if !self.incorporate_new_buffer(deleted)? {
                for lowered in 0..buffer[i] {
                    let candidate = splice(&buffer, i, i + 1, &[lowered]);
                    if self.incorporate_new_buffer(candidate)? {
                        break;
                    }
                    let mut escape = buffer[..i].to_vec();
                    escape.push(lowered);
                    let tail = self.rand_bytes(buffer.len() - i - 1);
                    escape.extend_from_slice(&tail);
                    if self.incorporate_new_buffer(escape)? {
                        break;
                    }
                }
            }
            i += 1;
        }
        Ok(())
    }

    /// Swap adjacent out-of-order bytes.
    fn sort_adjacent_bytes(&mut self) -> StepResult<()> {
        let mut i = 0;
        while i + 1 < self.best_data().buffer().len() {
            let buffer = self.best_data().buffer();
            if buffer[i] > buffer[i + 1] {
                let mut candidate = buffer.to_vec();
                candidate.swap(i, i + 1);
                self.incorporate_new_buffer(candidate)?;
            }
            i += 1;
        }
        Ok(())
    }

    /// Delete bytes; where a zero byte resists deletion, decrement the
    /// first nonzero byte to its left and set the zeros walked over to 255.
    /// A base-256 borrow, phrased over the byte prefix.
    fn borrow_down(&mut self) -> StepResult<()> {
        let mut i = 0;
        while i < self.best_data().buffer().len() {
            let buffer = self.best_data().buffer().to_vec();
            let deleted = splice(&buffer, i, i + 1, &[]);
            if !self.incorporate_new_buffer(deleted)? && buffer[i] == 0 {
                let mut candidate = buffer;
                let mut j = i;
                loop {
                    if candidate[j] > 0 {
                        candidate[j] -= 1;
                        self.incorporate_new_buffer(candidate)?;
                        break;
                    }
                    candidate[j] = 255;
                    if j == 0 {
                        break;
                    }
                    j -= 1;
                }
            }
            i += 1;
        }
        Ok(())
    }

    /// Lower equal byte pairs together, chasing smaller values after a
    /// success; an equal pair of zeros borrows from both left neighbors
    /// instead.
    fn lower_duplicate_pairs(&mut self) -> StepResult<()> {
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); 256];
        for (i, &b) in self.best_data().buffer().iter().enumerate() {
            buckets[b as usize].push(i);
        }
        let mut pairs = Vec::new();
        for bucket in &buckets {
            if bucket.len() > 1 {
                for (n, &j) in bucket.iter().enumerate() {
                    for &k in &bucket[n + 1..] {
                        pairs.push((j, k));
                    }
                }
            }
        }
        for (j, k) in pairs {
            let buffer = self.best_data().buffer().to_vec();
            if k >= buffer.len() || buffer[j] != buffer[k] {
                continue;
            }
            let value = buffer[j];
            if value == 0 {
                if j > 0 && buffer[j - 1] > 0 && buffer[k - 1] > 0 {
                    let mut candidate = buffer;
                    candidate[j - 1] -= 1;
                    candidate[j] = 255;
                    candidate[k - 1] -= 1;
                    candidate[k] = 255;
                    self.incorporate_new_buffer(candidate)?;
                }
                continue;
            }
            let mut candidate = buffer;
            candidate[j] = value - 1;
            candidate[k] = value - 1;
            if self.incorporate_new_buffer(candidate)? {
                for replacement in 0..value - 1 {
                    let mut candidate = self.best_data().buffer().to_vec();
                    candidate[j] = replacement;
                    candidate[k] = replacement;
                    if self.incorporate_new_buffer(candidate)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pairwise search over distant positions: sort out-of-order pairs,
    /// decrement unequal nonzero pairs together, and scan all replacements
    /// for the right byte while the left one is lowered.
    fn sort_and_lower_pairs(&mut self) -> StepResult<()> {
        let outer_len = self.best_data().buffer().len();
        for j in 0..outer_len {
            let row = self.best_data().buffer().to_vec();
            if j >= row.len() {
                break;
            }
            if row[j] == 0 {
                continue;
            }
            for k in j + 1..row.len() {
                let buffer = self.best_data().buffer().to_vec();
                if k >= buffer.len() {
                    break;
                }
                if buffer[j] > buffer[k] {
                    let mut candidate = buffer;
                    candidate.swap(j, k);
                    self.incorporate_new_buffer(candidate)?;
                }
                let buffer = self.best_data().buffer().to_vec();
                if k >= buffer.len() {
                    break;
                }
                if buffer[j] > 0 && buffer[k] > 0 && buffer[j] != buffer[k] {
                    let mut candidate = buffer.clone();
                    candidate[j] -= 1;
                    candidate[k] -= 1;
                    if self.incorporate_new_buffer(candidate)? {
                        break;
                    }
                }
                if buffer[j] == 0 {
                    break;
                }
                for replacement in 0..=255u8 {
                    let mut candidate = buffer.clone();
                    candidate[j] -= 1;
                    candidate[k] = replacement;
                    if self.incorporate_new_buffer(candidate)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
