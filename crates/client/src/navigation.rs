//! Full-page navigation.
//!
//! Ending a session is a hard reset: the client navigates to a login route
//! and all in-memory state is rebuilt from storage. Front ends implement
//! [`Navigator`] to perform that navigation.

use std::sync::{Mutex, PoisonError};

/// Performs full-page navigations.
pub trait Navigator: Send + Sync {
    /// Path of the page currently shown.
    fn current_path(&self) -> String;

    /// Leave the current page for `path`, discarding in-memory state.
    fn navigate(&self, path: &str);
}

/// Navigator that records where it was sent.
///
/// Used by the CLI (which has no pages, only a notion of "where the user
/// should go next") and by tests.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    /// Start at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![path.into()]),
        }
    }

    /// Every path visited, starting with the initial one.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Paths navigated to after the initial one.
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.history().into_iter().skip(1).collect()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, path: &str) {
        tracing::info!(path, "navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_owned());
    }
}
