//! hdrwindow records integer observations (typically latencies) that span several orders of
//! magnitude into a fixed amount of memory, while bounding the relative error of every stored
//! value to a configured number of significant decimal digits. On top of the recording structure
//! it provides percentile queries, a compact binary encoding, a line-oriented interval log, and a
//! rolling "windowed" histogram built from merge and unmerge.
//!
//! # HDR histograms
//!
//! A histogram is configured with the lowest and highest values it must be able to tell apart and
//! a precision expressed as significant figures. For example, a histogram configured to track
//! values between 1 and 3,600,000,000 with 3 significant figures keeps the quantization of any
//! value below 1/1,000th (0.1%) of that value. Tracking response times in microseconds this way
//! gives a resolution of 1 microsecond up to 1 millisecond, 1 millisecond (or better) up to one
//! second, and so on up to an hour.
//!
//! The memory used depends only on the configured range and precision, never on the number of
//! recorded samples. Values are placed in buckets that double the range they cover while keeping
//! the same number of linear sub-buckets, so memory grows with `log2(highest / lowest)`.
//!
//! # Recording samples
//!
//! ```
//! use hdrwindow::Histogram;
//!
//! // values in [1, 1 hour in ms] with 2 significant figures
//! let mut hist = Histogram::<u64>::new(1, 60 * 60 * 1000, 2).unwrap();
//!
//! // recording fails for values outside of [0, highest]
//! hist.record(54321).expect("value 54321 should be in range");
//! assert!(hist.record(60 * 60 * 1000 + 1).is_err());
//!
//! // several samples of the same value at once
//! hist.record_n(12, 3).unwrap();
//!
//! // if the code that generates the values is subject to Coordinated Omission,
//! // the self-correcting record method should be used instead.
//! // for example, if the expected sampling interval was 10 msec:
//! hist.record_corrected(54321, 10).expect("value 54321 should be in range");
//! ```
//!
//! # Querying samples
//!
//! ```
//! use hdrwindow::Histogram;
//!
//! let mut hist = Histogram::<u64>::new(1, 10_000_000, 3).unwrap();
//! for v in 0..1_000_000 {
//!     hist.record(v).unwrap();
//! }
//!
//! assert_eq!(hist.total_count(), 1_000_000);
//! assert_eq!(hist.value_at_quantile(50.0), 500_223);
//! assert_eq!(hist.value_at_quantile(99.9), 999_423);
//!
//! // several percentiles from a single scan
//! let values = hist.value_at_percentiles(&[50.0, 99.0]);
//! assert_eq!(values.get(99.0), Some(990_207));
//!
//! // the cumulative distribution along the halving ladder 0, 50, 75, 87.5, ...
//! let dist = hist.cumulative_distribution();
//! assert_eq!(dist.last().unwrap().count, 1_000_000);
//! ```
//!
//! # Aggregation
//!
//! Histograms with compatible configurations can be merged together, and a previously merged
//! histogram can be unmerged again. Neither operation fails: values that do not fit into the
//! destination are dropped and their number is returned.
//!
//! ```
//! use hdrwindow::Histogram;
//!
//! let mut a = Histogram::<u64>::new(1, 1000, 3).unwrap();
//! let mut b = Histogram::<u64>::new(1, 100_000, 3).unwrap();
//! a.record(10).unwrap();
//! b.record(20).unwrap();
//! b.record(50_000).unwrap();
//!
//! // 50,000 is past the highest trackable value of `a`
//! assert_eq!(1, a.merge(&b));
//! assert_eq!(2, a.total_count());
//! ```
//!
//! For rolling aggregation over the last few intervals, see `WindowedHistogram`. For the binary
//! encoding and the interval log, see the `serialization` module.
//!
//! # Concurrency
//!
//! None of the types in this crate synchronize internally. A histogram that is recorded into on
//! one thread and queried on another must be wrapped in a lock (or otherwise handed over) by the
//! caller.

#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
#![warn(clippy::all)]

use std::fmt;

use tracing::debug;

mod core;
pub mod errors;
pub mod iterators;

mod config;
mod percentile;
mod snapshot;
pub mod window;

#[cfg(feature = "serialization")]
pub mod serialization;

pub use crate::config::Config;
pub use crate::core::counter::Counter;
pub use crate::core::layout::Layout;
pub use crate::errors::{CreationError, ImportError, RecordError};
pub use crate::percentile::{Bracket, PercentileValues};
pub use crate::snapshot::Snapshot;
pub use crate::window::WindowedHistogram;

/// `Histogram` is the core data structure in hdrwindow. It records values, and performs analytics.
///
/// At its heart, it keeps the count for recorded samples in "buckets" of values. The resolution
/// and distribution of these buckets is tuned based on the desired highest trackable value, as
/// well as the user-specified number of significant decimal digits to preserve. The values for
/// the buckets are kept in a way that resembles floats and doubles: there is a mantissa and an
/// exponent, and each bucket represents a different exponent. The "sub-buckets" within a bucket
/// represent different values for the mantissa.
///
/// To a first approximation, the sub-buckets of the first bucket would hold the values `0`, `1`,
/// `2`, `3`, …, the sub-buckets of the second bucket would hold `0`, `2`, `4`, `6`, …, the third
/// would hold `0`, `4`, `8`, and so on. However, the low half of each bucket (except bucket 0) is
/// unnecessary, since those values are already covered by the sub-buckets of all the preceeding
/// buckets. Thus, `Histogram` keeps the top half of every such bucket.
///
/// The configuration is fixed at construction; a histogram never resizes itself.
///
/// `Histogram` does no internal locking. Wrap it in a `Mutex` (or similar) to share it between
/// threads.
#[derive(Clone)]
pub struct Histogram<T: Counter> {
    layout: Layout,

    total_count: u64,
    // raw value of the smallest recorded sample; i64::max_value() while empty
    min_value: i64,
    max_value: i64,

    start_time_ms: i64,
    end_time_ms: i64,
    tag: Option<String>,

    counts: Vec<T>,
}

/// Tracks the observed index range and total count while counts are rebuilt slot by slot, so the
/// cached statistics can be put back in one go.
pub(crate) struct RestatState<T: Counter> {
    min_non_zero_index: Option<usize>,
    max_index: Option<usize>,
    total_count: u64,
    phantom: std::marker::PhantomData<T>,
}

impl<T: Counter> RestatState<T> {
    pub(crate) fn new() -> RestatState<T> {
        RestatState {
            min_non_zero_index: None,
            max_index: None,
            total_count: 0,
            phantom: std::marker::PhantomData,
        }
    }

    /// Should be called on every non-zero count found
    #[inline]
    pub(crate) fn on_nonzero_count(&mut self, index: usize, count: T) {
        self.total_count = self.total_count.saturating_add(count.as_u64());

        self.max_index = Some(index);

        if self.min_non_zero_index.is_none() {
            self.min_non_zero_index = Some(index);
        }
    }

    /// Write updated min, max, total_count into histogram.
    /// Called once all counts have been iterated across.
    pub(crate) fn update_histogram(self, h: &mut Histogram<T>) {
        h.total_count = self.total_count;
        h.min_value = match self.min_non_zero_index {
            Some(i) => h.value_from_index(i),
            None => i64::max_value(),
        };
        h.max_value = match self.max_index {
            Some(i) => h.value_from_index(i),
            None => 0,
        };
    }
}

// construction and configuration
impl<T: Counter> Histogram<T> {
    /// Construct a `Histogram` that tracks values in `[0, high]` while telling apart values down
    /// to `low`, with the given number of significant decimal figures.
    ///
    /// `low` below 1 is treated as 1 and `sig_figs` is clamped into `[1, 5]`. `high` must be
    /// strictly greater than `low`.
    pub fn new(low: i64, high: i64, sig_figs: u8) -> Result<Histogram<T>, CreationError> {
        let layout = Layout::new(low, high, sig_figs)?;
        Ok(Histogram::with_layout(layout))
    }

    /// Construct an empty `Histogram` with the same configuration as `source`.
    ///
    /// The counter type of the new histogram does not need to match the source's.
    pub fn new_from<F: Counter>(source: &Histogram<F>) -> Histogram<T> {
        Histogram::with_layout(source.layout)
    }

    fn with_layout(layout: Layout) -> Histogram<T> {
        Histogram {
            layout,
            total_count: 0,
            min_value: i64::max_value(),
            max_value: 0,
            start_time_ms: 0,
            end_time_ms: 0,
            tag: None,
            counts: vec![T::zero(); layout.counts_len()],
        }
    }

    /// The configuration this histogram was built with, after clamping.
    pub fn config(&self) -> Config {
        Config {
            lowest_trackable_value: self.lowest_trackable_value(),
            highest_trackable_value: self.highest_trackable_value(),
            significant_figures: self.significant_figures(),
        }
    }

    /// Bucket geometry of this histogram.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the lowest trackable value.
    pub fn lowest_trackable_value(&self) -> i64 {
        self.layout.lowest_trackable_value()
    }

    /// Get the highest trackable value.
    pub fn highest_trackable_value(&self) -> i64 {
        self.layout.highest_trackable_value()
    }

    /// Get the number of significant value figures kept by this histogram.
    pub fn significant_figures(&self) -> u8 {
        self.layout.significant_figures()
    }

    /// Number of doubling buckets.
    pub fn bucket_count(&self) -> u8 {
        self.layout.bucket_count()
    }

    /// Number of linear sub-buckets in each bucket.
    pub fn sub_bucket_count(&self) -> u32 {
        self.layout.sub_bucket_count()
    }

    /// Get the number of slots in the counts array.
    ///
    /// This is not the number of recorded samples; see `total_count()` for that.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if no samples have been recorded.
    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Total number of samples recorded.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Start of the interval this histogram covers, in milliseconds since the epoch.
    pub fn start_time_ms(&self) -> i64 {
        self.start_time_ms
    }

    /// Set the start of the interval this histogram covers.
    pub fn set_start_time_ms(&mut self, ms: i64) {
        self.start_time_ms = ms;
    }

    /// End of the interval this histogram covers, in milliseconds since the epoch.
    pub fn end_time_ms(&self) -> i64 {
        self.end_time_ms
    }

    /// Set the end of the interval this histogram covers.
    pub fn set_end_time_ms(&mut self, ms: i64) {
        self.end_time_ms = ms;
    }

    /// Tag attached to this histogram, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Attach (or with `None`, clear) a tag.
    pub fn set_tag<S: Into<String>>(&mut self, tag: Option<S>) {
        self.tag = tag.map(Into::into);
    }
}

// recording
impl<T: Counter> Histogram<T> {
    /// Record a single sample.
    ///
    /// Returns an error if `value` is negative or exceeds the highest trackable value; the
    /// histogram is left unchanged in that case.
    pub fn record(&mut self, value: i64) -> Result<(), RecordError> {
        self.record_n(value, T::one())
    }

    /// Record `count` samples of the same value.
    ///
    /// Either the whole count is added or, on error, nothing is.
    pub fn record_n(&mut self, value: i64, count: T) -> Result<(), RecordError> {
        if !self.layout.is_trackable(value) {
            return Err(RecordError::ValueOutOfRange);
        }
        let index = self
            .layout
            .index_for(value as u64)
            .ok_or(RecordError::ValueOutOfRange)?;

        let slot = self.counts[index]
            .checked_add(&count)
            .ok_or(RecordError::CountOverflow)?;
        let total = self
            .total_count
            .checked_add(count.as_u64())
            .ok_or(RecordError::CountOverflow)?;

        self.counts[index] = slot;
        self.total_count = total;
        if count != T::zero() {
            self.update_min_max(value);
        }
        Ok(())
    }

    /// Record a value while correcting for coordinated omission.
    ///
    /// When a sample of `value` was recorded with an `expected_interval` between samples, it
    /// is likely that the measurement stalled for `value` and samples that should have been taken
    /// during the stall were lost. This records the value, then back-fills the missing samples
    /// `value - expected_interval`, `value - 2 * expected_interval`, ... down to
    /// `expected_interval`.
    ///
    /// An `expected_interval` of zero or below disables the correction.
    pub fn record_corrected(&mut self, value: i64, expected_interval: i64) -> Result<(), RecordError> {
        self.record(value)?;

        if expected_interval <= 0 || value <= expected_interval {
            return Ok(());
        }

        let mut missing_value = value - expected_interval;
        while missing_value >= expected_interval {
            self.record(missing_value)?;
            missing_value -= expected_interval;
        }
        Ok(())
    }

    /// Reset the contents and statistics of this histogram.
    ///
    /// Configuration and interval metadata (timestamps, tag) are preserved.
    pub fn reset(&mut self) {
        for c in self.counts.iter_mut() {
            *c = T::zero();
        }
        self.total_count = 0;
        self.min_value = i64::max_value();
        self.max_value = 0;
    }

    #[inline]
    fn update_min_max(&mut self, value: i64) {
        if value < self.min_value {
            self.min_value = value;
        }
        if value > self.max_value {
            self.max_value = value;
        }
    }

    /// Recompute total count, min and max from the counts array.
    pub(crate) fn restat(&mut self) {
        let mut restat_state = RestatState::new();
        for (index, &count) in self.counts.iter().enumerate() {
            if count != T::zero() {
                restat_state.on_nonzero_count(index, count);
            }
        }
        restat_state.update_histogram(self);
    }
}

// aggregation
impl<T: Counter> Histogram<T> {
    /// Add the samples of `other` to this histogram.
    ///
    /// The histograms do not need to share a configuration: every non-empty slot of `other` is
    /// recorded here at the lowest value of that slot. Samples whose value is beyond this
    /// histogram's highest trackable value (or whose count would overflow a counter) are dropped.
    ///
    /// Returns the number of dropped samples.
    pub fn merge(&mut self, other: &Histogram<T>) -> u64 {
        let mut dropped = 0_u64;
        for (index, &count) in other.counts.iter().enumerate() {
            if count == T::zero() {
                continue;
            }
            let value = other.value_from_index(index);
            let added = self.target_slot(&other.layout, index, value).and_then(|target| {
                let slot = self.counts[target].checked_add(&count)?;
                let total = self.total_count.checked_add(count.as_u64())?;
                Some((target, slot, total))
            });
            match added {
                Some((target, slot, total)) => {
                    self.counts[target] = slot;
                    self.total_count = total;
                    self.update_min_max(value);
                }
                None => dropped = dropped.saturating_add(count.as_u64()),
            }
        }

        if dropped > 0 {
            debug!(dropped, "merge dropped samples that do not fit");
        }
        dropped
    }

    /// Remove the samples of `other` from this histogram.
    ///
    /// This is the inverse of `merge` for a histogram that was previously merged in. Slots are
    /// matched by value the same way `merge` does. Values beyond the highest trackable value are
    /// skipped, and counts never go below zero: whatever could not be subtracted is reported as
    /// dropped.
    ///
    /// Returns the number of dropped samples.
    pub fn unmerge(&mut self, other: &Histogram<T>) -> u64 {
        let mut dropped = 0_u64;
        for (index, &count) in other.counts.iter().enumerate() {
            if count == T::zero() {
                continue;
            }
            let value = other.value_from_index(index);
            let target = match self.target_slot(&other.layout, index, value) {
                Some(i) => i,
                None => {
                    dropped = dropped.saturating_add(count.as_u64());
                    continue;
                }
            };

            let current = self.counts[target];
            let removed = if current < count { current } else { count };
            self.counts[target] = current - removed;
            dropped = dropped.saturating_add((count - removed).as_u64());
        }

        self.restat();

        if dropped > 0 {
            debug!(dropped, "unmerge dropped samples that were not present");
        }
        dropped
    }

    /// Slot here for slot `index` of a histogram with layout `from`, whose lowest value is
    /// `value`. Layouts with the same geometry share indices.
    fn target_slot(&self, from: &Layout, index: usize, value: i64) -> Option<usize> {
        if !self.layout.is_trackable(value) {
            return None;
        }
        if self.layout.same_geometry(from) && index < self.counts.len() {
            Some(index)
        } else {
            self.layout.index_for(value as u64)
        }
    }
}

// value lookups and statistics
impl<T: Counter> Histogram<T> {
    /// Counts index for `value`, if it is in range.
    fn index_for(&self, value: i64) -> Option<usize> {
        if value < 0 {
            return None;
        }
        self.layout.index_for(value as u64)
    }

    /// Lowest value that maps to the slot at `index`.
    pub(crate) fn value_from_index(&self, index: usize) -> i64 {
        saturating_i64(self.layout.value_from_index(index))
    }

    /// Count recorded in the slot at `index`.
    pub(crate) fn count_at_index(&self, index: usize) -> Option<T> {
        self.counts.get(index).cloned()
    }

    /// Overwrite the count of the slot at `index` without touching statistics. Callers must
    /// restat afterwards.
    pub(crate) fn set_count_at_index(&mut self, index: usize, count: T) -> Result<(), ()> {
        let slot = self.counts.get_mut(index).ok_or(())?;
        *slot = count;
        Ok(())
    }

    pub(crate) fn counts(&self) -> &[T] {
        &self.counts
    }

    /// Get the count of recorded samples that are equivalent to `value`.
    ///
    /// Values outside the trackable range have a count of zero.
    pub fn count_at(&self, value: i64) -> T {
        self.index_for(value)
            .and_then(|i| self.count_at_index(i))
            .unwrap_or_else(T::zero)
    }

    /// Get the lowest value that is equivalent to the given value within the histogram's
    /// resolution. Equivalent here means that value samples recorded for any two equivalent
    /// values are counted in a common total count.
    pub fn lowest_equivalent(&self, value: i64) -> i64 {
        saturating_i64(self.layout.lowest_equivalent(value.max(0) as u64))
    }

    /// Get the highest value that is equivalent to the given value within the histogram's
    /// resolution.
    pub fn highest_equivalent(&self, value: i64) -> i64 {
        saturating_i64(self.layout.highest_equivalent(value.max(0) as u64))
    }

    /// Get a value that lies in the middle (rounded up) of the range of values equivalent the
    /// given value.
    pub fn median_equivalent(&self, value: i64) -> i64 {
        saturating_i64(self.layout.median_equivalent(value.max(0) as u64))
    }

    /// Get the next value that is *not* equivalent to the given value within the histogram's
    /// resolution.
    pub fn next_non_equivalent(&self, value: i64) -> i64 {
        saturating_i64(self.layout.next_non_equivalent(value.max(0) as u64))
    }

    /// Get the size (in value units) of the range of values that are equivalent to the given
    /// value within the histogram's resolution.
    pub fn equivalent_range_len(&self, value: i64) -> i64 {
        saturating_i64(self.layout.equivalent_range_len(value.max(0) as u64))
    }

    /// Determine if two values are equivalent with the histogram's resolution.
    pub fn equivalent(&self, value1: i64, value2: i64) -> bool {
        self.lowest_equivalent(value1) == self.lowest_equivalent(value2)
    }

    /// Get the lowest recorded value level in the histogram, or 0 if it is empty.
    ///
    /// The value is reported at the lowest end of its equivalence range.
    pub fn min(&self) -> i64 {
        if self.total_count == 0 {
            0
        } else {
            self.lowest_equivalent(self.min_value)
        }
    }

    /// Get the highest recorded value level in the histogram, or 0 if it is empty.
    ///
    /// The value is reported at the highest end of its equivalence range.
    pub fn max(&self) -> i64 {
        if self.total_count == 0 {
            0
        } else {
            self.highest_equivalent(self.max_value)
        }
    }

    /// Get the computed mean value of all recorded values in the histogram.
    ///
    /// Every sample contributes the median equivalent value of its slot.
    pub fn mean(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        let sum = self
            .counts
            .iter()
            .enumerate()
            .filter(|&(_, c)| *c != T::zero())
            .fold(0_i128, |acc, (index, c)| {
                let median = i128::from(self.median_equivalent(self.value_from_index(index)));
                acc + median * i128::from(c.as_u64())
            });
        sum as f64 / self.total_count as f64
    }

    /// Get the computed population standard deviation of all recorded values in the histogram,
    /// using the same representative values as `mean`.
    pub fn stdev(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }

        let mean = self.mean();
        let geom_dev_tot = self
            .counts
            .iter()
            .enumerate()
            .filter(|&(_, c)| *c != T::zero())
            .fold(0.0_f64, |acc, (index, c)| {
                let dev = self.median_equivalent(self.value_from_index(index)) as f64 - mean;
                acc + (dev * dev) * c.as_f64()
            });

        (geom_dev_tot / self.total_count as f64).sqrt()
    }
}

// iterators
impl<T: Counter> Histogram<T> {
    /// Iterate through histogram values along the percentile ladder.
    ///
    /// The iteration starts at 0% and steps towards 100% in `ticks_per_half_distance` equal steps
    /// per halving of the distance that remains, so the resolution gets finer towards the tail.
    /// Each step reports the highest value of the slot where the running count reaches the step's
    /// percentile; one slot may be reported for several consecutive steps. The last step is
    /// always 100%.
    ///
    /// ```
    /// use hdrwindow::Histogram;
    ///
    /// let mut hist = Histogram::<u64>::new(1, 1000, 3).unwrap();
    /// hist.record_n(1, 3).unwrap();
    /// hist.record(10).unwrap();
    ///
    /// let steps: Vec<(f64, i64)> = hist
    ///     .iter_percentiles(1)
    ///     .map(|v| (v.percentile_iterated_to(), v.value_iterated_to()))
    ///     .collect();
    /// assert_eq!(
    ///     steps,
    ///     vec![(0.0, 1), (50.0, 1), (75.0, 1), (87.5, 10), (100.0, 10)]
    /// );
    /// ```
    pub fn iter_percentiles(
        &self,
        ticks_per_half_distance: u32,
    ) -> iterators::HistogramIterator<T, iterators::percentile::Iter> {
        iterators::percentile::Iter::new(self, ticks_per_half_distance)
    }

    /// Iterate through all recorded histogram values, one step per slot with a non-zero count.
    ///
    /// ```
    /// use hdrwindow::Histogram;
    ///
    /// let mut hist = Histogram::<u64>::new(1, 1000, 3).unwrap();
    /// hist.record_n(5, 2).unwrap();
    /// hist.record(900).unwrap();
    ///
    /// let recorded: Vec<(i64, u64)> = hist
    ///     .iter_recorded()
    ///     .map(|v| (v.value_iterated_to(), v.count_at_value()))
    ///     .collect();
    /// assert_eq!(recorded, vec![(5, 2), (900, 1)]);
    /// ```
    pub fn iter_recorded(&self) -> iterators::HistogramIterator<T, iterators::recorded::Iter> {
        iterators::recorded::Iter::new(self)
    }
}

impl<T: Counter, F: Counter> PartialEq<Histogram<F>> for Histogram<T> {
    fn eq(&self, other: &Histogram<F>) -> bool {
        if self.lowest_trackable_value() != other.lowest_trackable_value()
            || self.highest_trackable_value() != other.highest_trackable_value()
            || self.significant_figures() != other.significant_figures()
            || self.total_count != other.total_count
            || self.counts.len() != other.counts.len()
        {
            return false;
        }

        self.counts
            .iter()
            .zip(other.counts.iter())
            .all(|(a, b)| a.as_u64() == b.as_u64())
    }
}

impl<T: Counter> fmt::Debug for Histogram<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("lowest_trackable_value", &self.lowest_trackable_value())
            .field("highest_trackable_value", &self.highest_trackable_value())
            .field("significant_figures", &self.significant_figures())
            .field("total_count", &self.total_count)
            .field("min", &self.min())
            .field("max", &self.max())
            .field("start_time_ms", &self.start_time_ms)
            .field("end_time_ms", &self.end_time_ms)
            .field("tag", &self.tag)
            .finish()
    }
}

#[inline]
fn saturating_i64(v: u64) -> i64 {
    if v > i64::max_value() as u64 {
        i64::max_value()
    } else {
        v as i64
    }
}

#[cfg(test)]
#[path = "tests/tests.rs"]
mod tests;
