//! Errors returned by histogram construction, recording and import.

use std::error::Error;
use std::fmt;

/// Errors that can occur when creating a histogram.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum CreationError {
    /// Highest trackable value must be strictly greater than the lowest trackable value (after the
    /// lowest has been raised to at least 1).
    HighNotAboveLow,
    /// Cannot represent sigfig worth of values beyond the lowest trackable value. Decrease the
    /// significant figures, lowest trackable value, or both.
    ///
    /// This could happen if low is very large (like 2^60) and sigfigs is 5, which requires 18
    /// additional bits, which would then require more bits than will fit in a u64. Specifically,
    /// the exponent of the largest power of two that is smaller than the lowest value and the bits
    /// needed to represent the requested significant figures must sum to 63 or less.
    CannotRepresentSigFigBeyondLow,
    /// The `usize` type is too small to represent the desired configuration. Use fewer significant
    /// figures or a lower max.
    UsizeTypeTooSmall,
    /// A windowed histogram needs at least one slot in its ring.
    EmptyWindow,
}

impl fmt::Display for CreationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CreationError::HighNotAboveLow => write!(
                f,
                "Highest trackable value must be greater than the lowest trackable value"
            ),
            CreationError::CannotRepresentSigFigBeyondLow => write!(
                f,
                "Cannot represent sigfig worth of values beyond the lowest trackable value"
            ),
            CreationError::UsizeTypeTooSmall => write!(
                f,
                "The `usize` type is too small to represent the desired configuration"
            ),
            CreationError::EmptyWindow => {
                write!(f, "A windowed histogram needs at least one window")
            }
        }
    }
}

impl Error for CreationError {}

/// Errors that can occur while recording a value and its associated count.
///
/// A failed record leaves the histogram untouched.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum RecordError {
    /// The value is negative or above the highest trackable value. Configure a higher maximum
    /// value.
    ValueOutOfRange,
    /// Adding the count would overflow the counter type of the slot the value maps to.
    CountOverflow,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordError::ValueOutOfRange => write!(
                f,
                "The value to record is not representable in this histogram"
            ),
            RecordError::CountOverflow => write!(
                f,
                "The count for the recorded value would overflow the counter type"
            ),
        }
    }
}

impl Error for RecordError {}

/// Errors that can occur when importing a `Snapshot`.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum ImportError {
    /// The configuration in the snapshot is not valid.
    Creation(CreationError),
    /// The counts array is longer than the configuration allows.
    TooManyCounts,
    /// A count does not fit into the counter type of the histogram.
    UnsuitableCounterType,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImportError::Creation(e) => write!(f, "Invalid snapshot configuration: {}", e),
            ImportError::TooManyCounts => {
                write!(f, "Snapshot has more counts than its configuration allows")
            }
            ImportError::UnsuitableCounterType => {
                write!(f, "A snapshot count does not fit in the counter type")
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImportError::Creation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CreationError> for ImportError {
    fn from(e: CreationError) -> Self {
        ImportError::Creation(e)
    }
}
