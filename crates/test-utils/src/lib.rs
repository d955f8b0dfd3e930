//! Shared test utilities for the h4-cf workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Snapshot path helpers and skip macros for optional product snapshots
//! - A [`SnapshotBuilder`] that lays out HDF-EOS2 objects like the library does
//! - Geolocation generators with known dimension-map expansions
//! - Product names and native attribute fixtures
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod builder;
pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use builder::*;
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Skip a test if the required snapshot file is not found.
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_real_mod09() {
///     let path = require_test_file!("MOD09GA.yaml");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Add the snapshot or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Approximate floating-point equality.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two slices.
#[macro_export]
macro_rules! assert_slice_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = &$left;
        let right = &$right;
        assert_eq!(left.len(), right.len(), "slice lengths differ");
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_approx_eq!(*l, *r, $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_slice_approx_eq() {
        assert_slice_approx_eq!(vec![1.0f32, 2.0], vec![1.00001f64, 2.0], 0.001);
    }
}
