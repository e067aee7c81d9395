//! Integration test crate for ProEdit.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on multiple proedit crates to verify they work together.

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod lifecycle;
