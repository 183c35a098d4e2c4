use super::super::{Counter, Histogram};

pub fn histo64(low: i64, high: i64, sig_figs: u8) -> Histogram<u64> {
    Histogram::<u64>::new(low, high, sig_figs).unwrap()
}

/// Check the cached total, min and max against a scan of the counts.
pub fn assert_min_max_count<T: Counter>(h: &Histogram<T>) {
    let mut min = None;
    let mut max = None;
    let mut total = 0_u64;
    for (index, count) in h.counts().iter().enumerate() {
        if *count == T::zero() {
            continue;
        }
        let value = h.value_from_index(index);
        min = Some(min.map_or(value, |m: i64| m.min(value)));
        max = Some(max.map_or(value, |m: i64| m.max(value)));
        total += count.as_u64();
    }

    let min = min.map_or(0, |m| h.lowest_equivalent(m));
    let max = max.map_or(0, |m| h.highest_equivalent(m));

    assert_eq!(min, h.min());
    assert_eq!(max, h.max());
    assert_eq!(total, h.total_count());
}
