//! Indicator math for the replay chart.

pub mod indicators;

#[cfg(test)]
mod indicators_tests;

pub use indicators::*;
