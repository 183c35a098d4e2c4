//! Percentile queries: single and batched lookups, the cumulative distribution ladder, and the
//! classic percentile distribution report.

use std::io;

use serde::{Deserialize, Serialize};

use crate::{Counter, Histogram};

/// One rung of the cumulative distribution ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    /// Percentile (in `[0, 100]`) of this rung.
    pub quantile: f64,
    /// Number of samples at or below `value_at`.
    pub count: u64,
    /// Highest value of the slot where the rung was reached.
    pub value_at: i64,
}

/// Result of a batched percentile lookup, in the order the percentiles were requested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PercentileValues {
    values: Vec<(f64, i64)>,
}

impl PercentileValues {
    /// Value found for `percentile`, if it was requested.
    #[allow(clippy::float_cmp)]
    pub fn get(&self, percentile: f64) -> Option<i64> {
        self.values
            .iter()
            .find(|&&(p, _)| p == percentile)
            .map(|&(_, v)| v)
    }

    /// `(percentile, value)` pairs in request order.
    pub fn iter(&self) -> impl Iterator<Item = &(f64, i64)> {
        self.values.iter()
    }

    /// Number of requested percentiles.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no percentiles were requested.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for PercentileValues {
    type Item = (f64, i64);
    type IntoIter = std::vec::IntoIter<(f64, i64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Number of samples that must be at or below the value reported for `percentile`.
fn count_at_percentile(percentile: f64, total_count: u64) -> u64 {
    let percentile = if percentile > 100.0 { 100.0 } else { percentile };
    let target = (percentile / 100.0 * total_count as f64).ceil();
    // NaN lands here too
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    let below_one = !(target >= 1.0);
    if below_one {
        1
    } else {
        target as u64
    }
}

impl<T: Counter> Histogram<T> {
    /// Get the value at a given percentile.
    ///
    /// `percentile` is in `[0, 100]`; values above 100 are treated as 100. The result is the
    /// highest value equivalent to the first slot at which the running count reaches
    /// `ceil(percentile / 100 * total_count)` samples (and at least one sample). An empty
    /// histogram reports 0.
    ///
    /// The name is kept for historical reasons: the argument is a percentile, exactly as for
    /// `value_at_percentile`.
    pub fn value_at_quantile(&self, percentile: f64) -> i64 {
        if self.total_count() == 0 {
            return 0;
        }

        let target = count_at_percentile(percentile, self.total_count());
        let mut total_to_current_index = 0_u64;
        for (index, &count) in self.counts().iter().enumerate() {
            total_to_current_index = total_to_current_index.saturating_add(count.as_u64());
            if total_to_current_index >= target {
                return self.highest_equivalent(self.value_from_index(index));
            }
        }
        0
    }

    /// Get the value at a given percentile in `[0, 100]`. Identical to `value_at_quantile`.
    pub fn value_at_percentile(&self, percentile: f64) -> i64 {
        self.value_at_quantile(percentile)
    }

    /// Get the values for several percentiles at once.
    ///
    /// The result for each percentile is the same as `value_at_percentile` would give, but the
    /// counts are scanned only once regardless of how many percentiles are requested.
    pub fn value_at_percentiles(&self, percentiles: &[f64]) -> PercentileValues {
        let total = self.total_count();
        let mut values: Vec<(f64, i64)> = percentiles.iter().map(|&p| (p, 0)).collect();
        if total == 0 {
            return PercentileValues { values };
        }

        // visit requested percentiles in ascending threshold order
        let mut order: Vec<(u64, usize)> = percentiles
            .iter()
            .enumerate()
            .map(|(i, &p)| (count_at_percentile(p, total), i))
            .collect();
        order.sort();

        let mut pending = order.iter().peekable();
        let mut total_to_current_index = 0_u64;
        for (index, &count) in self.counts().iter().enumerate() {
            if count == T::zero() {
                continue;
            }
            total_to_current_index = total_to_current_index.saturating_add(count.as_u64());

            while let Some(&&(target, i)) = pending.peek() {
                if total_to_current_index < target {
                    break;
                }
                values[i].1 = self.highest_equivalent(self.value_from_index(index));
                let _ = pending.next();
            }
            if pending.peek().is_none() {
                break;
            }
        }

        PercentileValues { values }
    }

    /// The cumulative distribution along the percentile ladder with one tick per half distance:
    /// 0, 50, 75, 87.5, ... up to the last recorded value, then a final rung at 100.
    ///
    /// The last rung always is `{ quantile: 100, count: total_count }` and counts never decrease.
    pub fn cumulative_distribution(&self) -> Vec<Bracket> {
        self.cumulative_distribution_with_ticks(1)
    }

    /// Like `cumulative_distribution`, with `ticks_per_half_distance` rungs for each halving of
    /// the distance to 100%.
    pub fn cumulative_distribution_with_ticks(&self, ticks_per_half_distance: u32) -> Vec<Bracket> {
        self.iter_percentiles(ticks_per_half_distance)
            .map(|v| Bracket {
                quantile: v.percentile_iterated_to(),
                count: v.total_count_to_value(),
                value_at: v.value_iterated_to(),
            })
            .collect()
    }

    /// Write the percentile distribution report: a header, one row per ladder rung (value divided
    /// by `value_scale`, percentile as a fraction, running count and `1/(1-percentile)`), and a
    /// footer with mean, standard deviation, max, total count and the bucket geometry.
    ///
    /// ```
    /// use hdrwindow::Histogram;
    ///
    /// let mut hist = Histogram::<u64>::new(1, 1000, 3).unwrap();
    /// hist.record(100).unwrap();
    ///
    /// let mut out = Vec::new();
    /// hist.percentiles_print(&mut out, 1, 1.0).unwrap();
    /// let out = String::from_utf8(out).unwrap();
    /// assert!(out.starts_with(" Value\tPercentile\tTotalCount\t1/(1-Percentile)\n\n"));
    /// assert!(out.contains("     100.000     1.000000            1          inf\n"));
    /// ```
    pub fn percentiles_print<W: io::Write>(
        &self,
        writer: &mut W,
        ticks_per_half_distance: u32,
        value_scale: f64,
    ) -> io::Result<()> {
        writer.write_all(b" Value\tPercentile\tTotalCount\t1/(1-Percentile)\n\n")?;

        for bracket in self.cumulative_distribution_with_ticks(ticks_per_half_distance) {
            let percentile = bracket.quantile / 100.0;
            let inverse = if bracket.quantile >= 100.0 {
                format!("{:>12}", "inf")
            } else {
                format!("{:12.2}", 1.0 / (1.0 - percentile))
            };
            writeln!(
                writer,
                "{:12.3} {:12.6} {:12} {}",
                bracket.value_at as f64 / value_scale,
                percentile,
                bracket.count,
                inverse
            )?;
        }

        writeln!(
            writer,
            "#[Mean    = {:12.3}, StdDeviation   = {:12.3}]",
            self.mean() / value_scale,
            self.stdev() / value_scale
        )?;
        writeln!(
            writer,
            "#[Max     = {:12.3}, Total count    = {:12}]",
            self.max() as f64 / value_scale,
            self.total_count()
        )?;
        writeln!(
            writer,
            "#[Buckets = {:12}, SubBuckets     = {:12}]",
            self.bucket_count(),
            self.sub_bucket_count()
        )
    }
}
