//! Assertion macros for batch-stream tests.

mod macros;
