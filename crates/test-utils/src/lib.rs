//! Test support for the schism-regrid workspace: synthetic node clouds,
//! snapshot field builders, SCHISM naming fixtures and float assertions.

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a data file through [`find_test_file`] or return early from the
/// calling test. Real model output is large and never checked in.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "skipping: {} not found (set {})",
                    $name,
                    $crate::TEST_DATA_ENV
                );
                return;
            }
        }
    }};
}

/// `|left - right| <= epsilon`, compared as f64. NaN never passes.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        let diff = (left - right).abs();
        assert!(
            diff <= epsilon,
            "{} is not within {} of {} (diff {})",
            left,
            epsilon,
            right,
            diff
        );
    }};
}
