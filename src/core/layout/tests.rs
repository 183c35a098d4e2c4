use super::*;

fn layout(lowest: i64, highest: i64, significant_figures: u8) -> Layout {
    Layout::new(lowest, highest, significant_figures).unwrap()
}

#[test]
fn init_fields_smallest_possible_array() {
    // sig figs of 0 is raised to 1, so the sub buckets must hold 20
    let l = layout(1, 2, 0);

    assert_eq!(2, l.highest_trackable_value);
    assert_eq!(1, l.lowest_trackable_value);
    assert_eq!(1, l.significant_figures);

    assert_eq!(32, l.sub_bucket_count);
    assert_eq!(16, l.sub_bucket_half_count);
    assert_eq!(1, l.bucket_count);
    assert_eq!(32, l.counts_len);
    assert_eq!(4, l.sub_bucket_half_count_magnitude);
    assert_eq!(31, l.sub_bucket_mask);
    assert_eq!(0, l.unit_magnitude);
    assert_eq!(64 - 4 - 1, l.leading_zero_count_base);
}

#[test]
fn init_fields_max_value_max_precision_largest_possible_array() {
    let l = layout(1, i64::max_value(), 5);

    assert_eq!(5, l.significant_figures);
    // 5 sigdigs = 100,000. sub bucket must hold 200,000. 2^18 = 262,144.
    assert_eq!(1 << 18, l.sub_bucket_count);
    assert_eq!(1 << 17, l.sub_bucket_half_count);
    // 2^45 * 2^18 = 2^63 > i64::max_value(), so 46 buckets.
    assert_eq!(46, l.bucket_count);
    assert_eq!(47 * (1 << 17), l.counts_len);
    assert_eq!(17, l.sub_bucket_half_count_magnitude);
    assert_eq!((1 << 18) - 1, l.sub_bucket_mask);
    assert_eq!(64 - 17 - 1, l.leading_zero_count_base);
}

#[test]
fn init_fields_max_value_medium_precision() {
    let l = layout(1, i64::max_value(), 3);

    // 3 sigdigs = 1,000. sub bucket must hold 2,000. 2^11 = 2048.
    assert_eq!(1 << 11, l.sub_bucket_count);
    assert_eq!(1 << 10, l.sub_bucket_half_count);
    // 2^52 * 2048 == 2^63, so that's 53 buckets.
    assert_eq!(53, l.bucket_count);
    assert_eq!(54 * 1024, l.counts_len);
    assert_eq!(10, l.sub_bucket_half_count_magnitude);
    assert_eq!(64 - 10 - 1, l.leading_zero_count_base);
}

#[test]
fn init_fields_1_bucket_medium_precision() {
    let l = layout(1, 2000, 3);

    // 2^0 * 2048 > 2000, so that's 1 bucket.
    assert_eq!(1, l.bucket_count);
    assert_eq!(2048, l.counts_len);
    assert_eq!((1 << 11) - 1, l.sub_bucket_mask);
}

#[test]
fn init_fields_highest_exactly_at_bucket_edge_gets_another_bucket() {
    // 2048 itself would be untrackable with a single bucket
    let l = layout(1, 2048, 3);

    assert_eq!(2, l.bucket_count);
    assert!(l.index_for(2048).is_some());
}

#[test]
fn init_fields_min_precision_increased_min_value() {
    let l = layout(1000, i64::max_value(), 1);

    // sub bucket must hold 2 * 10^1 = 20, so 2^5
    assert_eq!(32, l.sub_bucket_count);
    assert_eq!(16, l.sub_bucket_half_count);
    assert_eq!(9, l.unit_magnitude);
    // 2^5 << 9 = 2^14, 2^49 * 2^14 = 2^63, so 50 buckets.
    assert_eq!(50, l.bucket_count);
    assert_eq!(51 * 16, l.counts_len);
    assert_eq!(31 << 9, l.sub_bucket_mask);
    assert_eq!(64 - 9 - 4 - 1, l.leading_zero_count_base);
}

#[test]
fn init_fields_10m_max_1k_min_middle_precision() {
    let l = layout(1000, 10_000_000, 3);

    assert_eq!(9, l.unit_magnitude);
    // 2^11 << 9 = 2^20, 2^4 * 2^20 = 2^24 is 16M, so 5 buckets.
    assert_eq!(5, l.bucket_count);
    assert_eq!(4 * 1024 + 2048, l.counts_len);
    assert_eq!(((1 << 11) - 1) << 9, l.sub_bucket_mask);
    assert_eq!(64 - 9 - 10 - 1, l.leading_zero_count_base);
}

#[test]
fn init_fields_known_configurations() {
    assert_eq!(15, layout(1, 30_000_000, 3).bucket_count());
    assert_eq!(2048, layout(1, 30_000_000, 3).sub_bucket_count());
    assert_eq!(14, layout(1, 10_000_000, 3).bucket_count());

    let l = layout(20, 1000, 3);
    assert_eq!(4, l.unit_magnitude);
    assert_eq!(1, l.bucket_count());
    assert_eq!(2048, l.counts_len());
}

#[test]
fn new_clamps_low_and_sig_figs() {
    let l = layout(0, 1000, 6);
    assert_eq!(1, l.lowest_trackable_value());
    assert_eq!(5, l.significant_figures());

    let l = layout(-5, 1000, 0);
    assert_eq!(1, l.lowest_trackable_value());
    assert_eq!(1, l.significant_figures());
}

#[test]
fn new_err_high_not_above_low() {
    assert_eq!(
        CreationError::HighNotAboveLow,
        Layout::new(10, 10, 3).unwrap_err()
    );
    // low is raised to 1 first
    assert_eq!(
        CreationError::HighNotAboveLow,
        Layout::new(0, 1, 3).unwrap_err()
    );
    assert_eq!(
        CreationError::HighNotAboveLow,
        Layout::new(1, -1, 3).unwrap_err()
    );
}

#[test]
fn unit_magnitude_53_sub_bucket_magnitude_11_errors() {
    assert_eq!(
        CreationError::CannotRepresentSigFigBeyondLow,
        Layout::new(1 << 53, 1 << 62, 3).unwrap_err()
    );
}

#[test]
fn unit_magnitude_0_index_calculations() {
    let l = layout(1, 1 << 32, 3);
    assert_eq!(2048, l.sub_bucket_count);
    assert_eq!(0, l.unit_magnitude);
    // sub_bucket_count = 2^11, so 2^11 << 22 is > the max of 2^32 for 23 buckets total
    assert_eq!(23, l.bucket_count);

    // first half of first bucket
    assert_eq!(0, l.bucket_for(3));
    assert_eq!(3, l.sub_bucket_for(3, 0));

    // second half of first bucket
    assert_eq!(0, l.bucket_for(1024 + 3));
    assert_eq!(1024 + 3, l.sub_bucket_for(1024 + 3, 0));

    // second bucket (top half)
    assert_eq!(1, l.bucket_for(2048 + 3 * 2));
    // counting by 2s, starting at halfway through the bucket
    assert_eq!(1024 + 3, l.sub_bucket_for(2048 + 3 * 2, 1));

    // third bucket (top half)
    assert_eq!(2, l.bucket_for((2048 << 1) + 3 * 4));
    assert_eq!(1024 + 3, l.sub_bucket_for((2048 << 1) + 3 * 4, 2));

    // past last bucket
    assert_eq!(23, l.bucket_for((2048_u64 << 22) + 3 * (1 << 23)));
    assert_eq!(
        1024 + 3,
        l.sub_bucket_for((2048_u64 << 22) + 3 * (1 << 23), 23)
    );
}

#[test]
fn unit_magnitude_12_index_calculations() {
    let l = layout(1 << 12, 1 << 32, 3);
    assert_eq!(12, l.unit_magnitude);
    // 2^11 << 12 = 2^23. 2^23 << 10 is > the max of 2^32 for 11 buckets total
    assert_eq!(11, l.bucket_count);
    let unit = 1_u64 << 12;

    // below lowest value
    assert_eq!(0, l.bucket_for(3));
    assert_eq!(0, l.sub_bucket_for(3, 0));

    // first half of first bucket
    assert_eq!(0, l.bucket_for(3 * unit));
    assert_eq!(3, l.sub_bucket_for(3 * unit, 0));

    // second half of first bucket
    assert_eq!(0, l.bucket_for(unit * (1024 + 3)));
    assert_eq!(1024 + 3, l.sub_bucket_for(unit * (1024 + 3), 0));

    // second bucket (top half), bucket scale = unit << 1.
    assert_eq!(1, l.bucket_for((unit << 11) + 3 * (unit << 1)));
    assert_eq!(
        1024 + 3,
        l.sub_bucket_for((unit << 11) + 3 * (unit << 1), 1)
    );
}

#[test]
fn unit_magnitude_52_single_bucket_reaches_i64_max() {
    let l = layout(1 << 52, i64::max_value(), 3);
    assert_eq!(52, l.unit_magnitude);
    // 2^11 << 52 = 2^63, past i64::max_value() already
    assert_eq!(1, l.bucket_count);
    assert_eq!(1, l.leading_zero_count_base);

    let max = i64::max_value() as u64;
    assert_eq!(0, l.bucket_for(max));
    assert_eq!(2047, l.sub_bucket_for(max, 0));
    assert_eq!(Some(2047), l.index_for(max));
}

#[test]
fn unit_magnitude_55_sub_bucket_magnitude_8_ok() {
    let l = layout(1 << 55, i64::max_value(), 2);
    assert_eq!(256, l.sub_bucket_count);
    assert_eq!(55, l.unit_magnitude);
    assert_eq!(1, l.bucket_count);

    // below lowest value
    assert_eq!(0, l.bucket_for(3));
    assert_eq!(0, l.sub_bucket_for(3, 0));
}

#[test]
fn index_for_and_back() {
    let l = layout(1, 100_000, 3);

    assert_eq!(Some(3), l.index_for(3));
    assert_eq!(Some(2047), l.index_for(2047));
    // start of second bucket lands right after the first full bucket
    assert_eq!(Some(2048), l.index_for(2048));
    assert_eq!(Some(2048), l.index_for(2049));
    assert_eq!(Some(3071), l.index_for(4095));

    assert_eq!(0, l.value_from_index(0));
    assert_eq!(1023, l.value_from_index(1023));
    assert_eq!(1024, l.value_from_index(1024));
    assert_eq!(2047, l.value_from_index(2047));
    assert_eq!(2048, l.value_from_index(2048));
    assert_eq!(4096 - 2, l.value_from_index(3071));
}

#[test]
fn index_for_unit_magnitude_2() {
    let l = layout(4, 100_000, 3);

    assert_eq!(0, l.value_from_index(0));
    assert_eq!(1023 * 4, l.value_from_index(1023));
    assert_eq!(1024 * 4, l.value_from_index(1024));
    assert_eq!(2048 * 4, l.value_from_index(2048));
    assert_eq!((4096 - 2) * 4, l.value_from_index(3071));

    assert_eq!(Some(1023), l.index_for(1023 * 4 + 3));
}

#[test]
fn index_for_past_end_of_counts() {
    let l = layout(1, 100_000, 3);
    assert_eq!(7, l.bucket_count);
    assert_eq!(8192, l.counts_len);

    assert_eq!(Some(8191), l.index_for((1 << 17) - 1));
    assert_eq!(None, l.index_for(1 << 17));
}

#[test]
fn index_for_is_monotonic() {
    let l = layout(1, 10_000_000, 3);
    let mut prev = 0;
    let mut v = 0_u64;
    while v <= 10_000_000 {
        let i = l.index_for(v).unwrap();
        assert!(i >= prev);
        // the lowest value of the slot maps back to the same slot
        assert_eq!(Some(i), l.index_for(l.value_from_index(i)));
        prev = i;
        v += 997;
    }
}

#[test]
fn equivalent_range_unit_magnitude_0() {
    let l = layout(1, 100_000, 3);

    assert_eq!(1, l.equivalent_range_len(0));
    assert_eq!(1, l.equivalent_range_len(1));
    assert_eq!(1, l.equivalent_range_len(1023));
    // first in top half
    assert_eq!(1, l.equivalent_range_len(1024));
    // last in top half
    assert_eq!(1, l.equivalent_range_len(2047));
    // first in 2nd bucket
    assert_eq!(2, l.equivalent_range_len(2048));
    assert_eq!(2, l.equivalent_range_len(2049));
    // end of 2nd bucket
    assert_eq!(2, l.equivalent_range_len(4095));
    // in 7th bucket
    assert_eq!(1 << 6, l.equivalent_range_len(100_000));
    // max value in top bucket
    assert_eq!(1 << 6, l.equivalent_range_len((1 << 17) - 1));
    // even bigger
    assert_eq!(1 << 7, l.equivalent_range_len(1 << 17));
}

#[test]
fn equivalent_range_unit_magnitude_2() {
    let l = layout(4, 100_000, 3);

    assert_eq!(4, l.equivalent_range_len(0));
    assert_eq!(4, l.equivalent_range_len(3));
    assert_eq!(4, l.equivalent_range_len(4095));
    assert_eq!(4, l.equivalent_range_len(8188));
    // first in 2nd bucket
    assert_eq!(8, l.equivalent_range_len(8192));
    assert_eq!(8, l.equivalent_range_len(16384 - 7));
}

#[test]
fn equivalent_range_max_buckets() {
    let l = layout(1, i64::max_value(), 3);

    assert_eq!(1, l.equivalent_range_len((1 << 11) - 1));
    assert_eq!(1 << 1, l.equivalent_range_len(1 << 11));
    assert_eq!(1 << 2, l.equivalent_range_len(1 << 12));
    assert_eq!(1 << 52, l.equivalent_range_len(1 << 62));
    assert_eq!(1 << 52, l.equivalent_range_len(i64::max_value() as u64));
}

#[test]
fn highest_equivalent_unit_magnitude_0() {
    let l = layout(1, 100_000, 3);

    assert_eq!(0, l.highest_equivalent(0));
    assert_eq!(1023, l.highest_equivalent(1023));
    assert_eq!(2047, l.highest_equivalent(2047));
    // first in 2nd bucket
    assert_eq!(2049, l.highest_equivalent(2048));
    assert_eq!(2049, l.highest_equivalent(2049));
    assert_eq!(4095, l.highest_equivalent(4095));
}

#[test]
fn highest_equivalent_unit_magnitude_2() {
    let l = layout(4, 100_000, 3);

    assert_eq!(3, l.highest_equivalent(0));
    assert_eq!(3, l.highest_equivalent(3));
    assert_eq!(7, l.highest_equivalent(4));
    assert_eq!(4099, l.highest_equivalent(4096));
    assert_eq!(8191, l.highest_equivalent(8188));
    // 2nd bucket has a scale of 8
    assert_eq!(8192 + 7, l.highest_equivalent(8192));
    assert_eq!(16384 - 1, l.highest_equivalent(16384 - 7));
}

#[test]
fn highest_equivalent_i64_max_value() {
    let l = layout(1, i64::max_value(), 3);
    let max = i64::max_value() as u64;

    assert_eq!(max, l.highest_equivalent(max));
    assert_eq!(max, l.highest_equivalent(max - 1));
}

#[test]
fn next_non_equivalent_unit_magnitude_0() {
    let l = layout(1, 100_000, 3);

    assert_eq!(1, l.next_non_equivalent(0));
    assert_eq!(1024, l.next_non_equivalent(1023));
    assert_eq!(2048, l.next_non_equivalent(2047));
    // 2nd bucket has a scale of 2
    assert_eq!(2050, l.next_non_equivalent(2048));
    assert_eq!(2050, l.next_non_equivalent(2049));
    assert_eq!(4096, l.next_non_equivalent(4095));
}

#[test]
fn lowest_equivalent_unit_magnitude_2() {
    let l = layout(4, 100_000, 3);

    assert_eq!(0, l.lowest_equivalent(0));
    assert_eq!(0, l.lowest_equivalent(3));
    assert_eq!(4, l.lowest_equivalent(4));
    // last in bottom half
    assert_eq!(1024 * 4 - 4, l.lowest_equivalent(1024 * 4 - 1));
    // last in top half
    assert_eq!(2048 * 4 - 4, l.lowest_equivalent(2048 * 4 - 1));
    // 2nd bucket has a scale of 8
    assert_eq!(8192, l.lowest_equivalent(8192 + 7));
    assert_eq!(16384 - 8, l.lowest_equivalent(16384 - 1));
}

#[test]
fn median_equivalent_rounds_up() {
    let l = layout(1, 100_000, 3);

    // a range of 1 is its own median
    assert_eq!(4, l.median_equivalent(4));
    // scale of 2 in the 2nd bucket
    assert_eq!(2049, l.median_equivalent(2048));
    assert_eq!(2049, l.median_equivalent(2049));
    // scale of 4 in the 3rd
    assert_eq!(4098, l.median_equivalent(4099));
}

#[test]
fn same_geometry_ignores_highest() {
    let a = layout(1, 1000, 3);
    let b = layout(1, 1_000_000, 3);
    let c = layout(16, 1_000_000, 3);
    let d = layout(1, 1000, 2);

    assert!(a.same_geometry(&b));
    assert!(!a.same_geometry(&c));
    assert!(!a.same_geometry(&d));
}

#[test]
fn is_trackable_bounds() {
    let l = layout(1, 1000, 3);

    assert!(l.is_trackable(0));
    assert!(l.is_trackable(1000));
    assert!(!l.is_trackable(1001));
    assert!(!l.is_trackable(-1));
}
