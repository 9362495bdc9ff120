// SPDX-FileCopyrightText: 2026 sqlgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrency-level instrument.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks the number of simultaneous holders and the highest level observed.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
    entries: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the instrumented section until the guard drops.
    pub fn enter(&self) -> ProbeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.entries.fetch_add(1, Ordering::SeqCst);
        ProbeGuard { probe: self }
    }

    /// Highest number of simultaneous holders seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total number of times the section was entered.
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    /// Holders inside the section right now.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Leaves the probed section on drop.
#[derive(Debug)]
pub struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_tracks_nested_entries() {
        let probe = ConcurrencyProbe::new();
        {
            let _a = probe.enter();
            let _b = probe.enter();
            assert_eq!(probe.current(), 2);
        }
        let _c = probe.enter();
        assert_eq!(probe.peak(), 2);
        assert_eq!(probe.entries(), 3);
        assert_eq!(probe.current(), 1);
    }
}
