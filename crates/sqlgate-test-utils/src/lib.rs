// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for sqlgate integration tests.
//!
//! # Components
//!
//! - [`ConcurrencyProbe`] - counts how many callers are inside a critical
//!   section at once and remembers the peak
//! - [`TestHarness`] - a temp-file SQLite client with the probe installed as
//!   the SQL function `probe(x)`

pub mod harness;
pub mod probe;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use probe::{ConcurrencyProbe, ProbeGuard};
