use std::time::Duration;

use kconfig_tree::ConfigNode;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::error::SessionError;

/// Receives session notifications.
///
/// Called from the session's background tasks, never while the tree lock is
/// held. Implementations must not block.
pub trait SessionListener: Send + Sync {
    /// Called after every snapshot that changed the tree.
    fn on_updated_tree(&self, tree: &[ConfigNode]);

    /// Called for malformed or backend-reported errors, unexpected stderr
    /// output and process failures.
    fn on_protocol_error(&self, error: &SessionError);
}

/// Owned form of a notification, for channel-based consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TreeUpdated(Vec<ConfigNode>),
    ProtocolError(String),
}

impl SessionListener for UnboundedSender<SessionEvent> {
    fn on_updated_tree(&self, tree: &[ConfigNode]) {
        let _ = self.send(SessionEvent::TreeUpdated(tree.to_vec()));
    }

    fn on_protocol_error(&self, error: &SessionError) {
        let _ = self.send(SessionEvent::ProtocolError(error.to_string()));
    }
}

/// Ignores every notification.
impl SessionListener for () {
    fn on_updated_tree(&self, _tree: &[ConfigNode]) {}

    fn on_protocol_error(&self, _error: &SessionError) {}
}

/// Wait up to `settle` for the next tree update.
///
/// An edit that changes no value produces no update, so `Ok(None)` after
/// `settle` means the tree is unchanged. Protocol errors seen on the way are
/// handed to `on_error`.
pub async fn next_tree<F>(
    events: &mut UnboundedReceiver<SessionEvent>,
    settle: Duration,
    mut on_error: F,
) -> Result<Option<Vec<ConfigNode>>, SessionError>
where
    F: FnMut(String),
{
    let wait = async {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::TreeUpdated(tree) => return Ok(tree),
                SessionEvent::ProtocolError(message) => on_error(message),
            }
        }
        Err(SessionError::Closed)
    };
    match tokio::time::timeout(settle, wait).await {
        Ok(tree) => tree.map(Some),
        Err(_) => {
            debug!("no tree update within {settle:?}");
            Ok(None)
        }
    }
}
