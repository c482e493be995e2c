use std::sync::atomic::{AtomicBool, Ordering};

/// Whether edits made through a session have been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirtyState {
    #[default]
    Saved,
    Unsaved,
}

/// Saved/unsaved flag owned by a session.
///
/// Only the session moves it; everyone else reads it through
/// [`Session::dirty_state`](crate::Session::dirty_state).
#[derive(Debug, Default)]
pub struct DirtyTracker {
    unsaved: AtomicBool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DirtyState {
        if self.unsaved.load(Ordering::Acquire) {
            DirtyState::Unsaved
        } else {
            DirtyState::Saved
        }
    }

    pub fn is_unsaved(&self) -> bool {
        self.state() == DirtyState::Unsaved
    }

    pub(crate) fn on_set_value(&self) {
        self.mark(DirtyState::Unsaved);
    }

    pub(crate) fn on_save(&self) {
        self.mark(DirtyState::Saved);
    }

    /// A plain reload leaves the flag alone.
    pub(crate) fn on_load(&self, discarding: bool) {
        if discarding {
            self.mark(DirtyState::Saved);
        }
    }

    pub(crate) fn on_set_defaults(&self) {
        self.mark(DirtyState::Saved);
    }

    fn mark(&self, state: DirtyState) {
        let unsaved = state == DirtyState::Unsaved;
        if self.unsaved.swap(unsaved, Ordering::AcqRel) != unsaved {
            debug!("configuration is now {state:?}");
        }
    }
}
