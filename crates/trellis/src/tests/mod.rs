//! Test suites for the bootstrap sequence.

mod support;
mod unit;
