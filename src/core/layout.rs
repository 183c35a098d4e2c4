use crate::errors::CreationError;

/// The fixed bucket geometry of a histogram.
///
/// Every constant is derived once from the lowest and highest trackable values and the number
/// of significant figures. The index functions on this type are pure: they only depend on the
/// value passed in and the layout, so they can be exercised without a histogram.
///
/// The buckets (each of which has `sub_bucket_count` sub-buckets, here assumed to be 2048 as an
/// example) overlap:
///
/// ```text
/// The 0'th bucket covers 0...2047 in multiples of 1, using all 2048 sub-buckets
/// The 1'th bucket covers 2048..4097 in multiples of 2, using only the top 1024 sub-buckets
/// The 2'th bucket covers 4096..8191 in multiple of 4, using only the top 1024 sub-buckets
/// ...
/// ```
///
/// Bucket 0 is the only one that uses all of its sub-buckets. The bottom half of every other
/// bucket overlaps with (and is better served by) the buckets before it, so the flat counts array
/// only stores the top half of each bucket after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    lowest_trackable_value: u64,
    highest_trackable_value: u64,
    significant_figures: u8,

    // Largest exponent of 2 that's smaller than the lowest trackable value. In [0, 62].
    unit_magnitude: u8,
    // In [0, 17]
    sub_bucket_half_count_magnitude: u8,
    // 2^(sub_bucket_half_count_magnitude + 1)
    sub_bucket_count: u32,
    sub_bucket_half_count: u32,
    // The bottom sub bucket's bits set, shifted by unit magnitude.
    sub_bucket_mask: u64,
    // Number of leading zeros that would be used by the largest value in bucket 0.
    leading_zero_count_base: u8,

    bucket_count: u8,
    counts_len: usize,
}

impl Layout {
    /// Compute the layout for the given configuration.
    ///
    /// `lowest` below 1 is raised to 1 and `significant_figures` is clamped into `[1, 5]`.
    pub fn new(lowest: i64, highest: i64, significant_figures: u8) -> Result<Layout, CreationError> {
        let lowest = lowest.max(1) as u64;
        if highest <= lowest as i64 {
            return Err(CreationError::HighNotAboveLow);
        }
        let highest = highest as u64;
        let significant_figures = significant_figures.max(1).min(5);

        // Given a 3 decimal point accuracy, the expectation is obviously for "+/- 1 unit at 1000".
        // It also means that it's "ok to be +/- 2 units at 2000". The "tricky" thing is that it is
        // NOT ok to be +/- 2 units at 1999. Only starting at 2000. So internally, we need to
        // maintain single unit resolution to 2x 10^decimal_points.
        let largest_with_single_unit_resolution = 2 * 10_u64.pow(u32::from(significant_figures));

        // floor(log2(lowest))
        let unit_magnitude = (63 - lowest.leading_zeros()) as u8;

        // ceil(log2(largest)), the power of two sub-bucket count that covers it
        let sub_bucket_count_magnitude =
            (64 - (largest_with_single_unit_resolution - 1).leading_zeros()) as u8;
        let sub_bucket_half_count_magnitude = sub_bucket_count_magnitude.max(1) - 1;

        if u32::from(unit_magnitude) + u32::from(sub_bucket_half_count_magnitude) + 1 > 63 {
            return Err(CreationError::CannotRepresentSigFigBeyondLow);
        }

        let sub_bucket_count = 1_u32 << (sub_bucket_half_count_magnitude + 1);
        let sub_bucket_half_count = sub_bucket_count / 2;
        let sub_bucket_mask = (u64::from(sub_bucket_count) - 1) << unit_magnitude;
        let leading_zero_count_base = 64 - unit_magnitude - sub_bucket_half_count_magnitude - 1;

        let bucket_count = buckets_to_cover(highest, sub_bucket_count, unit_magnitude);
        let counts_len = (bucket_count as usize + 1)
            .checked_mul(sub_bucket_half_count as usize)
            .ok_or(CreationError::UsizeTypeTooSmall)?;

        Ok(Layout {
            lowest_trackable_value: lowest,
            highest_trackable_value: highest,
            significant_figures,
            unit_magnitude,
            sub_bucket_half_count_magnitude,
            sub_bucket_count,
            sub_bucket_half_count,
            sub_bucket_mask,
            leading_zero_count_base,
            bucket_count,
            counts_len,
        })
    }

    /// Lowest trackable value, after clamping.
    pub fn lowest_trackable_value(&self) -> i64 {
        self.lowest_trackable_value as i64
    }

    /// Highest trackable value.
    pub fn highest_trackable_value(&self) -> i64 {
        self.highest_trackable_value as i64
    }

    /// Significant figures, after clamping.
    pub fn significant_figures(&self) -> u8 {
        self.significant_figures
    }

    /// Number of doubling buckets.
    pub fn bucket_count(&self) -> u8 {
        self.bucket_count
    }

    /// Number of linear slots in each bucket.
    pub fn sub_bucket_count(&self) -> u32 {
        self.sub_bucket_count
    }

    /// Total length of the flat counts array.
    pub fn counts_len(&self) -> usize {
        self.counts_len
    }

    /// Whether a value in `[0, highest_trackable_value]`.
    #[inline]
    pub fn is_trackable(&self, value: i64) -> bool {
        value >= 0 && value as u64 <= self.highest_trackable_value
    }

    /// Whether two layouts map every value to the same counts index.
    pub fn same_geometry(&self, other: &Layout) -> bool {
        self.unit_magnitude == other.unit_magnitude
            && self.sub_bucket_count == other.sub_bucket_count
    }

    /// Compute the lowest (and therefore highest precision) bucket index whose sub-buckets can
    /// represent the value.
    #[inline]
    pub fn bucket_for(&self, value: u64) -> u8 {
        // Calculates the number of powers of two by which the value is greater than the biggest
        // value that fits in bucket 0. The mask maps small values to bucket 0.
        self.leading_zero_count_base - (value | self.sub_bucket_mask).leading_zeros() as u8
    }

    /// Compute the position inside a bucket at which the given value should be recorded. For
    /// `bucket_index > 0` the result is always in the top half of the bucket.
    #[inline]
    pub fn sub_bucket_for(&self, value: u64, bucket_index: u8) -> u32 {
        (value >> (bucket_index + self.unit_magnitude)) as u32
    }

    /// Counts index for a value, or `None` if it falls past the end of the counts array.
    #[inline]
    pub fn index_for(&self, value: u64) -> Option<usize> {
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);

        debug_assert!(sub_bucket_index < self.sub_bucket_count);
        debug_assert!(bucket_index == 0 || sub_bucket_index >= self.sub_bucket_half_count);

        // The first slot used by a bucket is halfway through it; bucket 0 also gets the bottom
        // half, so the offset may be negative there and the sum still lands at or above zero.
        let bucket_base_index =
            (i64::from(bucket_index) + 1) << self.sub_bucket_half_count_magnitude;
        let offset_in_bucket = i64::from(sub_bucket_index) - i64::from(self.sub_bucket_half_count);
        let index = (bucket_base_index + offset_in_bucket) as usize;

        if index < self.counts_len {
            Some(index)
        } else {
            None
        }
    }

    /// Lowest value that maps to the given counts index.
    #[inline]
    pub fn value_from_index(&self, index: usize) -> u64 {
        let mut bucket_index = (index >> self.sub_bucket_half_count_magnitude) as isize - 1;
        let mut sub_bucket_index =
            (index as u32 & (self.sub_bucket_half_count - 1)) + self.sub_bucket_half_count;
        if bucket_index < 0 {
            sub_bucket_index -= self.sub_bucket_half_count;
            bucket_index = 0;
        }
        self.value_for(bucket_index as u8, sub_bucket_index)
    }

    #[inline]
    fn value_for(&self, bucket_index: u8, sub_bucket_index: u32) -> u64 {
        u64::from(sub_bucket_index) << (bucket_index + self.unit_magnitude)
    }

    /// Size of the range of values that share a slot with `value`.
    pub fn equivalent_range_len(&self, value: u64) -> u64 {
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        let adjusted_bucket = if sub_bucket_index >= self.sub_bucket_count {
            bucket_index + 1
        } else {
            bucket_index
        };
        1_u64 << (self.unit_magnitude + adjusted_bucket)
    }

    /// Lowest value that shares a slot with `value`.
    pub fn lowest_equivalent(&self, value: u64) -> u64 {
        let bucket_index = self.bucket_for(value);
        let sub_bucket_index = self.sub_bucket_for(value, bucket_index);
        self.value_for(bucket_index, sub_bucket_index)
    }

    /// First value above `value` that does not share its slot.
    pub fn next_non_equivalent(&self, value: u64) -> u64 {
        self.lowest_equivalent(value)
            .saturating_add(self.equivalent_range_len(value))
    }

    /// Highest value that shares a slot with `value`.
    pub fn highest_equivalent(&self, value: u64) -> u64 {
        self.next_non_equivalent(value) - 1
    }

    /// Middle (rounded up) of the range of values that share a slot with `value`.
    pub fn median_equivalent(&self, value: u64) -> u64 {
        self.lowest_equivalent(value)
            .saturating_add(self.equivalent_range_len(value) >> 1)
    }
}

/// If we have N such that sub_bucket_count * 2^N > high, we need storage for N+1 buckets.
fn buckets_to_cover(high: u64, sub_bucket_count: u32, unit_magnitude: u8) -> u8 {
    // the k'th bucket can express from 0 * 2^k to sub_bucket_count * 2^k in units of 2^k
    let mut smallest_untrackable_value = u64::from(sub_bucket_count) << unit_magnitude;

    // always have at least 1 bucket
    let mut buckets_needed = 1;
    while smallest_untrackable_value <= high {
        if smallest_untrackable_value > u64::max_value() / 2 {
            // next shift will overflow, meaning that bucket could represent values up to ones
            // greater than u64::max_value, so it's the last bucket
            return buckets_needed + 1;
        }
        smallest_untrackable_value <<= 1;
        buckets_needed += 1;
    }
    buckets_needed
}

#[cfg(test)]
mod tests;
