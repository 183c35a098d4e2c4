use serde::{Deserialize, Serialize};

use crate::errors::CreationError;
use crate::{Counter, Histogram, WindowedHistogram};

/// Histogram settings, suitable for loading from a configuration file.
///
/// Missing fields take their default: values from 1 to one hour in microseconds, with 3
/// significant figures.
///
/// ```
/// use hdrwindow::Config;
///
/// let config = Config {
///     highest_trackable_value: 60_000,
///     ..Config::default()
/// };
/// let hist = config.build::<u32>().unwrap();
/// assert_eq!(60_000, hist.highest_trackable_value());
/// assert_eq!(config, hist.config());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lowest value that can be told apart from 0. Values below 1 are raised to 1.
    pub lowest_trackable_value: i64,
    /// Highest value that can be recorded.
    pub highest_trackable_value: i64,
    /// Decimal digits of precision, clamped into `[1, 5]`.
    pub significant_figures: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lowest_trackable_value: 1,
            highest_trackable_value: 3_600_000_000,
            significant_figures: 3,
        }
    }
}

impl Config {
    /// Construct an empty histogram with these settings.
    pub fn build<T: Counter>(&self) -> Result<Histogram<T>, CreationError> {
        Histogram::new(
            self.lowest_trackable_value,
            self.highest_trackable_value,
            self.significant_figures,
        )
    }

    /// Construct a windowed histogram with `windows` ring slots and these settings.
    pub fn windowed<T: Counter>(&self, windows: usize) -> Result<WindowedHistogram<T>, CreationError> {
        WindowedHistogram::new(
            windows,
            self.lowest_trackable_value,
            self.highest_trackable_value,
            self.significant_figures,
        )
    }
}
