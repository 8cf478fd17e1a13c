//! Shared harness for the end-to-end engine tests.

pub mod harness;

pub use harness::{Shopper, Staff, TestHarness};
