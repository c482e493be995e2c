//! Backend process driver.
//!
//! A [`Session`] owns one confserver backend. Four tasks run per session:
//!
//! - stdout: bytes are framed into snapshots and merged into the tree
//! - stderr: lines are classified as informational or errors
//! - stdin: commands are written in the order they were issued
//! - exit: an unexpected non-zero exit is reported (spawned sessions only)
//!
//! Commands are fire-and-forget. The backend answers with snapshots that
//! reflect everything written so far, so there is nothing to correlate.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use confserver::Request;
use kconfig_tree::{
    ConfigNode, Envelope, NodeValue,
    data::{find_by_id, find_by_name, load_menus, merge},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, watch},
};

use crate::{
    dirty::{DirtyState, DirtyTracker},
    error::SessionError,
    listener::SessionListener,
    utils::ProcessSpec,
};

mod io;

pub use io::is_informational;

#[cfg(test)]
mod tests;

/// Where the option structure comes from.
#[derive(Debug, Clone)]
pub enum StructureSource {
    /// A ready-made forest.
    Nodes(Vec<ConfigNode>),
    /// A `kconfig_menus.json` file, read when the first snapshot arrives.
    ///
    /// The backend regenerates this file on startup, so it is not read
    /// before the backend has answered.
    File(PathBuf),
}

impl StructureSource {
    fn load(self) -> Result<Vec<ConfigNode>, SessionError> {
        match self {
            StructureSource::Nodes(nodes) => Ok(nodes),
            StructureSource::File(path) => {
                info!("loading option structure from {}", path.display());
                load_menus(&path).map_err(SessionError::Structure)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Persisted configuration targeted by `save` and `load`.
    pub config_file: PathBuf,
    pub structure: StructureSource,
}

#[derive(Debug, Clone, PartialEq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

struct Shared {
    tree: Mutex<Vec<ConfigNode>>,
    structure: Mutex<Option<StructureSource>>,
    commands: Mutex<Option<mpsc::UnboundedSender<Request>>>,
    ready: watch::Sender<Readiness>,
    closed: watch::Sender<bool>,
    disposed: AtomicBool,
    dirty: DirtyTracker,
    listener: Arc<dyn SessionListener>,
    config_file: PathBuf,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Merge one snapshot, loading the structure first if still pending.
    fn apply(&self, envelope: &Envelope) {
        if matches!(*self.ready.borrow(), Readiness::Failed(_)) {
            debug!("ignoring snapshot of a failed session");
            return;
        }

        let pending = lock(&self.structure).take();
        if let Some(source) = pending {
            match source.load() {
                Ok(nodes) => *lock(&self.tree) = nodes,
                Err(err) => {
                    self.fail(err.to_string());
                    self.report(&err);
                    return;
                }
            }
        }

        let updated = {
            let mut tree = lock(&self.tree);
            merge(&mut tree, envelope).then(|| tree.clone())
        };
        self.mark_ready();
        match updated {
            Some(tree) => self.listener.on_updated_tree(&tree),
            None => debug!("snapshot carried no values"),
        }
    }

    fn report(&self, err: &SessionError) {
        error!("{err}");
        self.listener.on_protocol_error(err);
    }

    fn mark_ready(&self) {
        let changed = self.ready.send_if_modified(|state| {
            if *state == Readiness::Pending {
                *state = Readiness::Ready;
                true
            } else {
                false
            }
        });
        if changed {
            info!("backend ready");
        }
    }

    fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.ready.send_if_modified(|state| {
            if *state == Readiness::Pending {
                *state = Readiness::Failed(reason);
                true
            } else {
                false
            }
        });
    }

    fn close_commands(&self) {
        lock(&self.commands).take();
    }

    fn mark_closed(&self) {
        self.close_commands();
        self.closed.send_replace(true);
    }
}

/// Handle to a backend session.
///
/// Clones share the same backend. Background tasks only hold weak
/// references, so dropping the last handle closes the backend's stdin just
/// like [`dispose`](Session::dispose).
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Spawn `backend` and start driving it.
    ///
    /// Must be called from within a tokio runtime. A spawn failure is
    /// reported to the listener and returned.
    pub fn spawn(
        backend: &ProcessSpec,
        options: SessionOptions,
        listener: Arc<dyn SessionListener>,
    ) -> Result<Self, SessionError> {
        info!("starting backend: {}", backend.command_line());
        let mut child = match backend.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = SessionError::Spawn {
                    program: backend.program.clone(),
                    source,
                };
                error!("{err}");
                listener.on_protocol_error(&err);
                return Err(err);
            }
        };

        let stdin = child.stdin.take().ok_or(SessionError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SessionError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SessionError::MissingPipe("stderr"))?;

        let session = Self::start(stdin, stdout, stderr, options, listener, false);
        tokio::spawn(io::watch_exit(child, Arc::downgrade(&session.shared)));
        Ok(session)
    }

    /// Drive a backend reachable through arbitrary streams.
    ///
    /// The session counts as closed once `stdout` reaches end of file.
    pub fn attach<W, R, E>(
        stdin: W,
        stdout: R,
        stderr: E,
        options: SessionOptions,
        listener: Arc<dyn SessionListener>,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        Self::start(stdin, stdout, stderr, options, listener, true)
    }

    fn start<W, R, E>(
        stdin: W,
        stdout: R,
        stderr: E,
        options: SessionOptions,
        listener: Arc<dyn SessionListener>,
        close_on_eof: bool,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            tree: Mutex::new(Vec::new()),
            structure: Mutex::new(Some(options.structure)),
            commands: Mutex::new(Some(tx)),
            ready: watch::Sender::new(Readiness::Pending),
            closed: watch::Sender::new(false),
            disposed: AtomicBool::new(false),
            dirty: DirtyTracker::new(),
            listener,
            config_file: options.config_file,
        });

        let weak = Arc::downgrade(&shared);
        tokio::spawn(io::write_commands(stdin, rx, weak.clone()));
        tokio::spawn(io::read_snapshots(stdout, weak.clone(), close_on_eof));
        tokio::spawn(io::read_stderr(stderr, weak));

        Self { shared }
    }

    /// Wait until the first snapshot has been merged.
    ///
    /// Fails if the backend's output ends, or the structure cannot be
    /// loaded, before that happens.
    pub async fn wait_ready(&self) -> Result<(), SessionError> {
        let mut rx = self.shared.ready.subscribe();
        let state = rx
            .wait_for(|state| *state != Readiness::Pending)
            .await
            .map_err(|_| SessionError::Closed)?;
        match &*state {
            Readiness::Ready => Ok(()),
            Readiness::Failed(reason) => Err(SessionError::NotReady(reason.clone())),
            Readiness::Pending => Err(SessionError::Closed),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.shared.ready.borrow() == Readiness::Ready
    }

    /// Resolves once the backend is gone.
    pub async fn closed(&self) {
        let mut rx = self.shared.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Whether commands can still reach the backend.
    pub fn is_alive(&self) -> bool {
        !self.shared.disposed.load(Ordering::Acquire) && !*self.shared.closed.borrow()
    }

    /// A read-only copy of the current tree.
    pub fn tree(&self) -> Vec<ConfigNode> {
        lock(&self.shared.tree).clone()
    }

    /// Look a node up by symbol name, falling back to its id.
    pub fn node(&self, key: &str) -> Option<ConfigNode> {
        let tree = lock(&self.shared.tree);
        find_by_name(&tree, key)
            .or_else(|| find_by_id(&tree, key))
            .cloned()
    }

    pub fn config_file(&self) -> &Path {
        &self.shared.config_file
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.shared.dirty.state()
    }

    pub fn is_unsaved(&self) -> bool {
        self.shared.dirty.is_unsaved()
    }

    /// Send an edit of `node`. The new state arrives with a later snapshot.
    pub fn set_value(&self, node: &ConfigNode, value: &NodeValue) -> Result<(), SessionError> {
        let request = Request::set(node, value)?;
        self.send(request)?;
        self.shared.dirty.on_set_value();
        Ok(())
    }

    /// Parse `text` for the option called `name` and send it.
    pub fn set_value_by_name(&self, name: &str, text: &str) -> Result<(), SessionError> {
        let node = self
            .node(name)
            .ok_or_else(|| SessionError::UnknownOption(name.to_string()))?;
        let value = NodeValue::parse(node.kind, text, &node.name)?;
        self.set_value(&node, &value)
    }

    /// Ask the backend to write its values to the configuration file.
    pub fn save(&self) -> Result<(), SessionError> {
        self.send(Request::save(&self.shared.config_file))?;
        self.shared.dirty.on_save();
        Ok(())
    }

    /// Ask the backend to re-read the configuration file.
    ///
    /// With `discarding`, pending edits are thrown away and the session
    /// counts as saved again.
    pub fn load(&self, discarding: bool) -> Result<(), SessionError> {
        self.send(Request::load(&self.shared.config_file))?;
        self.shared.dirty.on_load(discarding);
        Ok(())
    }

    /// Close the backend's stdin after queued commands are written.
    ///
    /// The backend is not killed; it is expected to exit on its own.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("disposing backend session");
        self.shared.close_commands();
    }

    fn send(&self, request: Request) -> Result<(), SessionError> {
        let commands = lock(&self.shared.commands);
        let tx = commands.as_ref().ok_or(SessionError::Closed)?;
        tx.send(request).map_err(|_| SessionError::Closed)
    }

    pub(crate) fn dirty(&self) -> &DirtyTracker {
        &self.shared.dirty
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config_file", &self.shared.config_file)
            .field("ready", &*self.shared.ready.borrow())
            .field("dirty", &self.shared.dirty.state())
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
