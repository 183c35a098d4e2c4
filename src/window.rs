//! Rolling aggregation over the most recent recording intervals.
//!
//! A `WindowedHistogram` keeps a ring of `n` histograms that all share one configuration. Samples
//! are recorded into the open window (`current_mut()`); `rotate()` closes it and opens the next
//! slot of the ring. The closed windows are kept pre-merged so that neither rotating nor viewing
//! the whole window has to add up all `n` histograms.
//!
//! ```
//! use hdrwindow::WindowedHistogram;
//!
//! let mut w = WindowedHistogram::<u64>::new(2, 1, 1000, 3).unwrap();
//! for v in 0..100 {
//!     w.current_mut().record(v).unwrap();
//! }
//! w.rotate();
//! for v in 100..200 {
//!     w.current_mut().record(v).unwrap();
//! }
//! w.rotate();
//! for v in 200..300 {
//!     w.current_mut().record(v).unwrap();
//! }
//!
//! // 0..100 has aged out
//! assert_eq!(200, w.merge().total_count());
//! assert_eq!(199, w.merge().value_at_quantile(50.0));
//! ```

use tracing::trace;

use crate::errors::CreationError;
use crate::{Counter, Histogram};

/// A ring of histograms giving a view over the last `n - 1` closed windows plus the open one.
///
/// Like `Histogram`, this does no internal locking.
#[derive(Debug, Clone)]
pub struct WindowedHistogram<T: Counter> {
    ring: Vec<Histogram<T>>,
    // slot of the open window
    current: usize,
    // sum of the closed windows still in view
    merged: Histogram<T>,
    scratch: Histogram<T>,
    rotations: u64,
}

impl<T: Counter> WindowedHistogram<T> {
    /// Construct a windowed histogram with `n` ring slots, each configured like
    /// `Histogram::new(low, high, sig_figs)`.
    pub fn new(n: usize, low: i64, high: i64, sig_figs: u8) -> Result<WindowedHistogram<T>, CreationError> {
        if n == 0 {
            return Err(CreationError::EmptyWindow);
        }

        let first = Histogram::<T>::new(low, high, sig_figs)?;
        let mut w = WindowedHistogram {
            ring: vec![first.clone(); n],
            current: n - 1,
            merged: first.clone(),
            scratch: first,
            rotations: 0,
        };
        let _ = w.advance();
        w.rotations = 0;
        Ok(w)
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Always false: a window has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of rotations since construction.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// The open window.
    pub fn current(&self) -> &Histogram<T> {
        &self.ring[self.current]
    }

    /// The open window, for recording.
    pub fn current_mut(&mut self) -> &mut Histogram<T> {
        &mut self.ring[self.current]
    }

    /// Close the open window and open the next slot of the ring.
    ///
    /// The slot that is reused held the oldest closed window, which leaves the view. Returns the
    /// merged closed windows that are still in view.
    pub fn rotate(&mut self) -> &Histogram<T> {
        if !self.ring[self.current].is_empty() {
            let _ = self.merged.merge(&self.ring[self.current]);
        }
        self.advance()
    }

    /// The whole view: the closed windows in view plus the open window.
    ///
    /// The result lives in a scratch histogram that is overwritten by the next call; clone it to
    /// keep it.
    pub fn merge(&mut self) -> &Histogram<T> {
        self.scratch.reset();
        let _ = self.scratch.merge(&self.merged);
        let _ = self.scratch.merge(&self.ring[self.current]);
        &self.scratch
    }

    fn advance(&mut self) -> &Histogram<T> {
        self.current = (self.current + 1) % self.ring.len();
        self.rotations += 1;

        let slot = &mut self.ring[self.current];
        if !slot.is_empty() {
            let _ = self.merged.unmerge(slot);
            slot.reset();
        }
        trace!(
            slot = self.current,
            rotations = self.rotations,
            in_view = self.merged.total_count(),
            "rotated window"
        );
        &self.merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_windows_is_an_error() {
        assert_eq!(
            CreationError::EmptyWindow,
            WindowedHistogram::<u64>::new(0, 1, 1000, 3).unwrap_err()
        );
    }

    #[test]
    fn bad_config_is_an_error() {
        assert_eq!(
            CreationError::HighNotAboveLow,
            WindowedHistogram::<u64>::new(3, 10, 10, 3).unwrap_err()
        );
    }

    #[test]
    fn starts_at_first_slot() {
        let w = WindowedHistogram::<u64>::new(3, 1, 1000, 3).unwrap();
        assert_eq!(0, w.current);
        assert_eq!(0, w.rotations());
        assert_eq!(3, w.len());
        assert!(w.current().is_empty());
    }

    #[test]
    fn single_slot_only_sees_open_window() {
        let mut w = WindowedHistogram::<u64>::new(1, 1, 1000, 3).unwrap();
        w.current_mut().record(5).unwrap();
        assert_eq!(1, w.merge().total_count());

        assert_eq!(0, w.rotate().total_count());
        assert_eq!(0, w.merge().total_count());
    }

    #[test]
    fn rotate_returns_closed_windows_in_view() {
        let mut w = WindowedHistogram::<u64>::new(3, 1, 1000, 3).unwrap();
        for round in 1..=5_i64 {
            w.current_mut().record_n(round, round as u64).unwrap();
            let in_view = w.rotate().total_count();
            // at most two closed windows are kept
            let expected: i64 = (1.max(round - 1)..=round).sum();
            assert_eq!(expected as u64, in_view);
        }
        assert_eq!(5, w.rotations());
    }

    #[test]
    fn merge_does_not_disturb_state() {
        let mut w = WindowedHistogram::<u64>::new(2, 1, 1000, 3).unwrap();
        w.current_mut().record(10).unwrap();
        let _ = w.rotate();
        w.current_mut().record(20).unwrap();

        assert_eq!(2, w.merge().total_count());
        assert_eq!(2, w.merge().total_count());
        assert_eq!(1, w.current().total_count());
        assert_eq!(20, w.current().max());
    }
}
