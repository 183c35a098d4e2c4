//! core components and types used throughout this library

/// Counter type defining operations required by the histogram and impls for primitives.
pub mod counter;

/// Bucket geometry and the pure value <-> index arithmetic built on it.
pub mod layout;

