//! Slicekit: functional collection utilities with panic recovery
//!
//! This crate collects the everyday transformations over collections in three
//! flavors, plus the boundary that turns panics in user code into errors:
//!
//! | Module | What it operates on |
//! |--------|---------------------|
//! | [`slices`], [`sets`] | borrowed slices and owned `Vec`s, eagerly |
//! | [`seq`] | lazy, possibly infinite sequences with early termination |
//! | [`parallel`] | slices, on a bounded worker pool, output in input order |
//! | [`safe`] | any closure: panics become [`PanicError`] values |
//!
//! Every `safe_*` operation runs the caller's function under [`safe::recover`],
//! so a panic in that function surfaces as [`SafeError::Panicked`] instead of
//! unwinding, while errors the function returns itself pass through as
//! [`SafeError::Failed`].
//!
//! # Example
//!
//! ```
//! use slicekit::{parallel_map, safe_execute, slices, SafeError};
//!
//! let squares = parallel_map(&[1, 2, 3, 4], |x| x * x);
//! assert_eq!(squares, vec![1, 4, 9, 16]);
//! assert_eq!(slices::reduce(&squares, 0, |acc, x| acc + x), 30);
//!
//! let boom: Result<(), SafeError<String>> = safe_execute(|| panic!("boom"));
//! assert_eq!(boom.unwrap_err().to_string(), "encountered panic: boom");
//! ```

pub mod parallel;
pub mod safe;
pub mod seq;
pub mod sets;
pub mod slices;

// Re-export main types at crate root
pub use parallel::{
    parallel_for_each, parallel_for_each_with, parallel_map, parallel_map_with,
    safe_parallel_map, safe_parallel_map_with, ParallelConfig,
};
pub use safe::{
    recover, recover_with, safe_execute, safe_execute_traced, safe_execute_with, PanicError,
    RecoverConfig, SafeError, DEFAULT_TRACE_CAPACITY,
};
pub use seq::{Drive, Flow, Seq, Stage};
pub use sets::Identifiable;
pub use slices::Occurrences;
