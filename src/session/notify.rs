//! User-visible notifications.

use crate::ErrorClass;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Sink for messages the user should see.
pub trait Notifier: Send {
    fn notify(&self, class: ErrorClass, message: &str);
}

/// Prints notifications to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, class: ErrorClass, message: &str) {
        eprintln!("[{}] {}", class, message);
    }
}

/// Discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _class: ErrorClass, _message: &str) {}
}

/// Keeps every notification in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    records: Arc<Mutex<Vec<(ErrorClass, String)>>>,
}

impl RecordingNotifier {
    pub fn records(&self) -> Vec<(ErrorClass, String)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, class: ErrorClass, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((class, message.to_string()));
        }
    }
}

/// Remembers which error classes were already shown this session.
#[derive(Debug, Clone, Default)]
pub struct NotifyOnce {
    shown: HashSet<ErrorClass>,
}

impl NotifyOnce {
    /// Returns true the first time `class` is seen.
    pub fn first(&mut self, class: ErrorClass) -> bool {
        self.shown.insert(class)
    }
}
