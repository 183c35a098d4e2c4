//! Iterators over the recorded counts of a `Histogram`.
//!
//! Both iterators walk the flat counts array in index order, which is also ascending value order.
//! What differs between them is which slots they stop at, which is decided by a `PickyIterator`.

use crate::{Counter, Histogram};

/// An iterator that walks the percentile ladder.
pub mod percentile;
/// An iterator that only yields slots with recorded samples.
pub mod recorded;

/// A trait for designing an subset iterator over values in a `Histogram`.
pub trait PickyIterator<T: Counter> {
    /// Return `Some` if an `IterationValue` should be emitted at this point.
    ///
    /// `index` is a valid index in the relevant histogram. `total_count_to_index` includes the
    /// count at `index`.
    ///
    /// This will be called with the same index until it returns `None`. This enables modes of
    /// iteration that yield different values represented by the same slot.
    fn pick(
        &mut self,
        index: usize,
        total_count_to_index: u64,
        count_at_index: T,
    ) -> Option<PickMetadata>;

    /// Should we keep iterating even though the last index with non-zero count has already been
    /// picked at least once?
    ///
    /// This will be called every time iteration continues after the last index with non-zero
    /// count has been picked.
    fn more(&mut self, index_to_pick: usize) -> bool;
}

/// Extra information about the picked point in the histogram provided by the picker.
pub struct PickMetadata {
    /// The percentile reached by the iterator, if the picker tracks one.
    percentile_iterated_to: Option<f64>,
}

impl PickMetadata {
    fn new(percentile_iterated_to: Option<f64>) -> PickMetadata {
        PickMetadata {
            percentile_iterated_to,
        }
    }
}

/// `HistogramIterator` provides a base iterator for a `Histogram`.
///
/// It will iterate over all discrete values until there are no more recorded values (i.e. *not*
/// necessarily until all slots have been exhausted). To facilitate the development of more
/// sophisticated iterators, a *picker* is also provided, which is allowed to only select some
/// slots that should be yielded. The picker may also extend the iteration to include a suffix of
/// empty slots.
pub struct HistogramIterator<'a, T: 'a + Counter, P: PickyIterator<T>> {
    hist: &'a Histogram<T>,
    total_count_to_index: u64,
    prev_total_count: u64,
    count_since_last_iteration: u64,
    current_index: usize,
    fresh: bool,
    ended: bool,
    picker: P,
}

/// The value emitted at each step when iterating over a `Histogram`.
#[derive(Debug, PartialEq)]
pub struct IterationValue<T: Counter> {
    value_iterated_to: i64,
    percentile: f64,
    percentile_iterated_to: f64,
    count_at_value: T,
    count_since_last_iteration: u64,
    total_count_to_value: u64,
}

impl<T: Counter> IterationValue<T> {
    /// The value iterated to. Some iterators provide a specific value inside the slot, while
    /// others just use the highest value in the slot.
    pub fn value_iterated_to(&self) -> i64 {
        self.value_iterated_to
    }

    /// Percentile (in `[0, 100]`) of samples at or below the value iterated to.
    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Percentile the iterator was stepping towards when it stopped here. For the percentile
    /// ladder this is the ladder rung; otherwise it equals `percentile()`.
    pub fn percentile_iterated_to(&self) -> f64 {
        self.percentile_iterated_to
    }

    /// Recorded count for values equivalent to the value iterated to.
    pub fn count_at_value(&self) -> T {
        self.count_at_value
    }

    /// Number of samples covered since the previous step.
    pub fn count_since_last_iteration(&self) -> u64 {
        self.count_since_last_iteration
    }

    /// Number of samples at or below the value iterated to.
    pub fn total_count_to_value(&self) -> u64 {
        self.total_count_to_value
    }
}

impl<'a, T: Counter, P: PickyIterator<T>> HistogramIterator<'a, T, P> {
    fn new(h: &'a Histogram<T>, picker: P) -> HistogramIterator<'a, T, P> {
        HistogramIterator {
            hist: h,
            total_count_to_index: 0,
            prev_total_count: 0,
            count_since_last_iteration: 0,
            current_index: 0,
            picker,
            fresh: true,
            ended: false,
        }
    }

    fn current(&self, metadata: PickMetadata) -> IterationValue<T> {
        let total = self.hist.total_count();
        let percentile = if total == 0 {
            100.0
        } else {
            100.0 * self.total_count_to_index as f64 / total as f64
        };
        let count_at_value = self
            .hist
            .count_at_index(self.current_index)
            .unwrap_or_else(T::zero);

        // an empty histogram has no slot to report
        let value_iterated_to = if total == 0 {
            0
        } else {
            self.hist
                .highest_equivalent(self.hist.value_from_index(self.current_index))
        };

        IterationValue {
            value_iterated_to,
            percentile,
            percentile_iterated_to: metadata.percentile_iterated_to.unwrap_or(percentile),
            count_at_value,
            count_since_last_iteration: self.count_since_last_iteration,
            total_count_to_value: self.total_count_to_index,
        }
    }
}

impl<'a, T: 'a, P> Iterator for HistogramIterator<'a, T, P>
where
    T: Counter,
    P: PickyIterator<T>,
{
    type Item = IterationValue<T>;

    fn next(&mut self) -> Option<Self::Item> {
        // We walk the indices of the counts array, but stop once the running total reaches the
        // total count: everything past that is zero. After that point only the picker's `more()`
        // can keep the iteration going, for trailing steps such as the final 100th percentile.
        //
        // Loop rather than recurse when a slot is not picked.
        while !self.ended {
            if self.current_index == self.hist.len() {
                self.ended = true;
                return None;
            }

            // have we yielded all non-zeros in the histogram?
            let total = self.hist.total_count();
            if self.prev_total_count == total {
                // is the picker done?
                if !self.picker.more(self.current_index) {
                    self.ended = true;
                    return None;
                }
            } else if self.fresh {
                let count = self
                    .hist
                    .count_at_index(self.current_index)
                    .unwrap_or_else(T::zero)
                    .as_u64();

                // maintain total count so we can yield percentiles
                self.total_count_to_index = self.total_count_to_index.saturating_add(count);
                self.count_since_last_iteration =
                    self.count_since_last_iteration.saturating_add(count);

                // make sure we don't add this index again
                self.fresh = false;
            }

            let count_at_index = self
                .hist
                .count_at_index(self.current_index)
                .unwrap_or_else(T::zero);
            if let Some(metadata) =
                self.picker
                    .pick(self.current_index, self.total_count_to_index, count_at_index)
            {
                let val = self.current(metadata);

                // we *don't* advance the index here: the picker sees the same slot again and may
                // yield it more than once
                self.prev_total_count = self.total_count_to_index;
                self.count_since_last_iteration = 0;
                return Some(val);
            }

            // check the next entry
            self.current_index += 1;
            self.fresh = true;
        }
        None
    }
}
