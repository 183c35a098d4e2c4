use serde::{Deserialize, Serialize};

use crate::errors::ImportError;
use crate::{Config, Counter, Histogram};

/// A plain-data copy of a histogram: its configuration, interval metadata and the dense counts
/// array, trimmed after the last non-empty slot.
///
/// Snapshots are meant for hand-off through `serde` formats. The binary codec in the
/// `serialization` module is the compact alternative.
///
/// ```
/// use hdrwindow::Histogram;
///
/// let mut hist = Histogram::<u64>::new(1, 1000, 3).unwrap();
/// hist.record_n(7, 3).unwrap();
///
/// let snapshot = hist.export();
/// let copy = Histogram::<u64>::import(&snapshot).unwrap();
/// assert_eq!(hist, copy);
/// assert_eq!(7, copy.max());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Configuration of the exported histogram.
    pub config: Config,
    /// Interval start in milliseconds since the epoch.
    #[serde(default)]
    pub start_time_ms: i64,
    /// Interval end in milliseconds since the epoch.
    #[serde(default)]
    pub end_time_ms: i64,
    /// Interval tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Count per slot, in index order.
    pub counts: Vec<u64>,
}

impl<T: Counter> Histogram<T> {
    /// Copy this histogram into a `Snapshot`.
    pub fn export(&self) -> Snapshot {
        let used = self
            .counts()
            .iter()
            .rposition(|c| *c != T::zero())
            .map_or(0, |i| i + 1);

        Snapshot {
            config: self.config(),
            start_time_ms: self.start_time_ms(),
            end_time_ms: self.end_time_ms(),
            tag: self.tag().map(str::to_owned),
            counts: self.counts()[..used].iter().map(|c| c.as_u64()).collect(),
        }
    }

    /// Rebuild a histogram from a `Snapshot`.
    pub fn import(snapshot: &Snapshot) -> Result<Histogram<T>, ImportError> {
        let mut h: Histogram<T> = snapshot.config.build()?;
        if snapshot.counts.len() > h.len() {
            return Err(ImportError::TooManyCounts);
        }

        for (index, &count) in snapshot.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let count = T::from_u64(count).ok_or(ImportError::UnsuitableCounterType)?;
            h.set_count_at_index(index, count)
                .map_err(|_| ImportError::TooManyCounts)?;
        }
        h.restat();

        h.set_start_time_ms(snapshot.start_time_ms);
        h.set_end_time_ms(snapshot.end_time_ms);
        h.set_tag(snapshot.tag.clone());
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CreationError;

    #[test]
    fn export_trims_trailing_empty_slots() {
        let mut h = Histogram::<u64>::new(1, 100_000, 3).unwrap();
        h.record(3).unwrap();
        let s = h.export();
        assert_eq!(4, s.counts.len());
        assert_eq!(vec![0, 0, 0, 1], s.counts);
    }

    #[test]
    fn export_empty_has_no_counts() {
        let h = Histogram::<u64>::new(1, 100_000, 3).unwrap();
        assert!(h.export().counts.is_empty());
    }

    #[test]
    fn import_rejects_oversized_counts() {
        let h = Histogram::<u64>::new(1, 1000, 3).unwrap();
        let mut s = h.export();
        s.counts = vec![1; h.len() + 1];
        assert_eq!(
            ImportError::TooManyCounts,
            Histogram::<u64>::import(&s).unwrap_err()
        );
    }

    #[test]
    fn import_rejects_count_too_big_for_counter() {
        let mut h = Histogram::<u64>::new(1, 1000, 3).unwrap();
        h.record_n(2, 300).unwrap();
        assert_eq!(
            ImportError::UnsuitableCounterType,
            Histogram::<u8>::import(&h.export()).unwrap_err()
        );
    }

    #[test]
    fn import_rejects_bad_config() {
        let mut s = Histogram::<u64>::new(1, 1000, 3).unwrap().export();
        s.config.highest_trackable_value = 1;
        assert_eq!(
            ImportError::Creation(CreationError::HighNotAboveLow),
            Histogram::<u64>::import(&s).unwrap_err()
        );
    }

    #[test]
    fn import_restores_metadata_and_stats() {
        let mut h = Histogram::<u64>::new(1, 100_000, 3).unwrap();
        h.record_n(10, 2).unwrap();
        h.record(5000).unwrap();
        h.set_start_time_ms(1_000);
        h.set_end_time_ms(2_000);
        h.set_tag(Some("db"));

        let copy = Histogram::<u32>::import(&h.export()).unwrap();
        assert_eq!(3, copy.total_count());
        assert_eq!(10, copy.min());
        assert_eq!(h.max(), copy.max());
        assert_eq!(1_000, copy.start_time_ms());
        assert_eq!(2_000, copy.end_time_ms());
        assert_eq!(Some("db"), copy.tag());
    }
}
