use crate::iterators::{HistogramIterator, PickMetadata, PickyIterator};
use crate::{Counter, Histogram};

/// An iterator that will yield at percentile steps through the histogram's value range.
///
/// Steps get finer as the percentile approaches 100: the distance to 100% is halved at each level,
/// and each level is split into `ticks_per_half_distance` equal steps. With one tick per half
/// distance this yields 0, 50, 75, 87.5, 93.75, ... and finally 100.
pub struct Iter {
    total_count: u64,
    ticks_per_half_distance: u32,
    percentile_to_iterate_to: f64,
    reached_end: bool,
}

impl Iter {
    /// Construct a new percentile iterator. See `Histogram::iter_percentiles` for details.
    ///
    /// A `ticks_per_half_distance` of 0 is treated as 1.
    pub fn new<T: Counter>(
        hist: &Histogram<T>,
        ticks_per_half_distance: u32,
    ) -> HistogramIterator<T, Iter> {
        HistogramIterator::new(
            hist,
            Iter {
                total_count: hist.total_count(),
                ticks_per_half_distance: ticks_per_half_distance.max(1),
                percentile_to_iterate_to: 0.0,
                reached_end: false,
            },
        )
    }

    fn step(&mut self) {
        // The choice to maintain fixed-sized "ticks" in each half-distance to 100% [starting from
        // 0%], as opposed to a "tick" size that varies with each interval, was made to make the
        // steps easily comprehensible and readable to humans. The resulting percentile steps are
        // much easier to browse through in a percentile distribution output, for example.
        //
        // We calculate the number of equal-sized "ticks" that the 0-100 range will be divided by
        // at the current scale. The scale is determined by the percentile level we are iterating
        // to. The following math determines the tick size for the current scale, and maintain a
        // fixed tick size for the remaining "half the distance to 100%" [from either 0% or from
        // the previous half-distance]. When that half-distance is crossed, the scale changes and
        // the tick size is effectively cut in half.
        let half_distance = 2_f64
            .powf((100.0 / (100.0 - self.percentile_to_iterate_to)).log2().trunc() + 1.0)
            .trunc();
        let percentile_reporting_ticks = f64::from(self.ticks_per_half_distance) * half_distance;
        self.percentile_to_iterate_to += 100.0 / percentile_reporting_ticks;
    }
}

impl<T: Counter> PickyIterator<T> for Iter {
    fn pick(&mut self, _: usize, running_total: u64, count_at_index: T) -> Option<PickMetadata> {
        if self.reached_end {
            // the trailing step to 100% is taken wherever the walk stopped
            return Some(PickMetadata::new(Some(100.0)));
        }

        if count_at_index == T::zero() {
            return None;
        }

        let current_percentile = 100.0 * running_total as f64 / self.total_count as f64;
        if self.percentile_to_iterate_to > current_percentile {
            return None;
        }

        let iterated_to = self.percentile_to_iterate_to;
        self.step();
        Some(PickMetadata::new(Some(iterated_to)))
    }

    fn more(&mut self, _: usize) -> bool {
        // one additional last step to 100%
        if self.reached_end {
            false
        } else {
            self.reached_end = true;
            true
        }
    }
}
