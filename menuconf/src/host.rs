use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::ResolvedConfig, error::SessionError, listener::SessionListener, session::Session,
};

/// Owner of the single live session of a workspace.
///
/// `init` hands out the running session when there is one, so concurrent
/// callers never start a second backend.
#[derive(Debug, Default)]
pub struct SessionHost {
    slot: Mutex<Option<Session>>,
}

impl SessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live session, spawning the configured backend if needed, and
    /// wait until it has reported its first snapshot.
    pub async fn init(
        &self,
        config: &ResolvedConfig,
        listener: Arc<dyn SessionListener>,
    ) -> Result<Session, SessionError> {
        self.init_with(|| Session::spawn(&config.backend, config.session_options(), listener))
            .await
    }

    /// Like [`init`](Self::init) with a custom way of starting the session.
    pub async fn init_with<F>(&self, start: F) -> Result<Session, SessionError>
    where
        F: FnOnce() -> Result<Session, SessionError>,
    {
        let session = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref().filter(|session| session.is_alive()) {
                Some(session) => {
                    debug!("reusing live session");
                    session.clone()
                }
                None => {
                    let session = start()?;
                    *slot = Some(session.clone());
                    session
                }
            }
        };
        session.wait_ready().await?;
        Ok(session)
    }

    pub async fn current(&self) -> Option<Session> {
        self.slot
            .lock()
            .await
            .as_ref()
            .filter(|session| session.is_alive())
            .cloned()
    }

    /// Whether the live session has unsaved edits. `false` without one.
    pub async fn is_unsaved(&self) -> bool {
        self.current()
            .await
            .is_some_and(|session| session.is_unsaved())
    }

    pub async fn dispose(&self) {
        if let Some(session) = self.slot.lock().await.take() {
            session.dispose();
        }
    }
}
