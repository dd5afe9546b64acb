//! Shared scan state.
//!
//! One [`ScanControl`] is created per scan and shared (by reference or
//! `Arc`) between the scan loop, the Ctrl-C handler, and anything that
//! reports progress. The loop checks [`ScanControl::is_active`] between
//! documents, never in the middle of one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug)]
pub struct ScanControl {
    active: AtomicBool,
    total: AtomicU64,
    processed: AtomicU64,
    current_file: RwLock<Option<String>>,
}

/// Point-in-time copy of a [`ScanControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSnapshot {
    pub active: bool,
    pub total: u64,
    pub processed: u64,
    pub current_file: Option<String>,
}

impl ScanControl {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            current_file: RwLock::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Ask the scan loop to stop before its next document.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn begin(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.processed.store(0, Ordering::SeqCst);
    }

    pub(crate) fn start_file(&self, name: &str) {
        if let Ok(mut current) = self.current_file.write() {
            *current = Some(name.to_string());
        }
    }

    pub(crate) fn finish_file(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut current) = self.current_file.write() {
            *current = None;
        }
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            active: self.is_active(),
            total: self.total.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            current_file: self.current_file.read().ok().and_then(|c| c.clone()),
        }
    }
}

impl Default for ScanControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn tracks_progress_and_cancellation() {
        let control = ScanControl::new();
        control.begin(3);
        control.start_file("a.txt");
        assert_eq!(control.snapshot().current_file.as_deref(), Some("a.txt"));
        control.finish_file();

        let snap = control.snapshot();
        assert!(snap.active);
        assert_eq!((snap.processed, snap.total), (1, 3));
        assert_eq!(snap.current_file, None);

        control.cancel();
        assert!(!control.is_active());
    }

    #[test]
    fn cancel_is_visible_across_threads() {
        let control = Arc::new(ScanControl::new());
        let handle = {
            let control = Arc::clone(&control);
            std::thread::spawn(move || control.cancel())
        };
        handle.join().unwrap();
        assert!(!control.is_active());
    }
}
