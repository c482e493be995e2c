use std::{path::PathBuf, sync::Arc, time::Duration};

use kconfig_tree::{ConfigNode, NodeKind, NodeValue, data::find_by_name};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex},
    sync::mpsc::{UnboundedReceiver, unbounded_channel},
    time::timeout,
};
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::listener::{SessionEvent, next_tree};

const WAIT: Duration = Duration::from_secs(5);

const FIRST: &str = r#"{"values": {"FOO": false}, "visible": {}, "ranges": {}}"#;

struct Stub {
    session: Session,
    events: UnboundedReceiver<SessionEvent>,
    stdin: BufReader<DuplexStream>,
    stdout: DuplexStream,
    stderr: DuplexStream,
}

impl Stub {
    fn attach(structure: StructureSource) -> Self {
        let (session_in, backend_in) = duplex(4096);
        let (backend_out, session_out) = duplex(4096);
        let (backend_err, session_err) = duplex(4096);
        let (tx, events) = unbounded_channel();
        let session = Session::attach(
            session_in,
            session_out,
            session_err,
            SessionOptions {
                config_file: PathBuf::from("/work/blink/sdkconfig"),
                structure,
            },
            Arc::new(tx),
        );
        Self {
            session,
            events,
            stdin: BufReader::new(backend_in),
            stdout: backend_out,
            stderr: backend_err,
        }
    }

    async fn emit(&mut self, raw: &str) {
        self.stdout.write_all(raw.as_bytes()).await.unwrap();
    }

    async fn next_line(&mut self) -> String {
        let mut line = String::new();
        timeout(WAIT, self.stdin.read_line(&mut line))
            .await
            .expect("no command written")
            .unwrap();
        line
    }

    async fn next_event(&mut self) -> SessionEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("no event")
            .expect("listener dropped")
    }

    async fn next_tree(&mut self) -> Vec<ConfigNode> {
        match self.next_event().await {
            SessionEvent::TreeUpdated(tree) => tree,
            other => panic!("expected a tree update, got {other:?}"),
        }
    }

    async fn next_error(&mut self) -> String {
        match self.next_event().await {
            SessionEvent::ProtocolError(message) => message,
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    async fn ready(&mut self, raw: &str) -> Vec<ConfigNode> {
        self.emit(raw).await;
        assert_ok!(timeout(WAIT, self.session.wait_ready()).await.unwrap());
        self.next_tree().await
    }
}

fn foo_tree() -> StructureSource {
    StructureSource::Nodes(vec![ConfigNode::new("FOO", "FOO", NodeKind::Bool)])
}

fn choice_tree() -> StructureSource {
    StructureSource::Nodes(vec![
        ConfigNode::new("log-level", "LOG_LEVEL", NodeKind::Choice).with_children([
            ConfigNode::new("LOG_LEVEL_ERROR", "LOG_LEVEL_ERROR", NodeKind::Bool),
            ConfigNode::new("LOG_LEVEL_INFO", "LOG_LEVEL_INFO", NodeKind::Bool),
            ConfigNode::new("LOG_LEVEL_DEBUG", "LOG_LEVEL_DEBUG", NodeKind::Bool),
        ]),
        ConfigNode::new("STACK", "STACK", NodeKind::Int),
    ])
}

#[tokio::test]
async fn first_snapshot_then_edit() {
    let mut stub = Stub::attach(foo_tree());
    assert!(!stub.session.is_ready());

    let tree = stub.ready(FIRST).await;
    assert_eq!(tree[0].value, NodeValue::Bool(false));
    assert!(stub.events.try_recv().is_err());
    assert_eq!(stub.session.dirty_state(), DirtyState::Saved);

    let foo = stub.session.node("FOO").unwrap();
    stub.session.set_value(&foo, &NodeValue::Bool(true)).unwrap();
    assert_eq!(
        stub.next_line().await,
        "{\"version\": 2, \"set\": {\"FOO\": true}}\n"
    );
    assert_eq!(stub.session.dirty_state(), DirtyState::Unsaved);

    stub.session.save().unwrap();
    assert_eq!(
        stub.next_line().await,
        "{\"version\": 2, \"save\": \"/work/blink/sdkconfig\"}\n"
    );
    assert_eq!(stub.session.dirty_state(), DirtyState::Saved);
}

#[tokio::test]
async fn snapshots_update_the_tree() {
    let mut stub = Stub::attach(foo_tree());
    stub.ready(FIRST).await;

    stub.emit(r#"{"values": {"FOO": true}, "visible": {"FOO": true}, "ranges": {}}"#)
        .await;
    let tree = stub.next_tree().await;
    assert_eq!(tree[0].value, NodeValue::Bool(true));
    assert!(tree[0].visible);
    assert_eq!(stub.session.tree(), tree);
}

#[tokio::test]
async fn commands_keep_their_order() {
    let mut stub = Stub::attach(choice_tree());
    stub.ready(r#"{"values": {"LOG_LEVEL_INFO": true, "STACK": 4096}, "visible": {}, "ranges": {"STACK": [512, 8192]}}"#)
        .await;

    stub.session.set_value_by_name("LOG_LEVEL", "LOG_LEVEL_DEBUG").unwrap();
    stub.session.set_value_by_name("STACK", "2048").unwrap();
    stub.session.load(false).unwrap();

    assert_eq!(
        stub.next_line().await,
        "{\"version\": 2, \"set\": {\"LOG_LEVEL_DEBUG\": true}}\n"
    );
    assert_eq!(
        stub.next_line().await,
        "{\"version\": 2, \"set\": {\"STACK\": 2048}}\n"
    );
    assert_eq!(
        stub.next_line().await,
        "{\"version\": 2, \"load\": \"/work/blink/sdkconfig\"}\n"
    );
    // A plain reload does not count as discarding.
    assert!(stub.session.is_unsaved());

    stub.session.load(true).unwrap();
    stub.next_line().await;
    assert!(!stub.session.is_unsaved());
}

#[tokio::test]
async fn choice_snapshot_is_exclusive() {
    let mut stub = Stub::attach(choice_tree());
    let tree = stub
        .ready(r#"{"values": {"LOG_LEVEL_ERROR": true, "LOG_LEVEL_INFO": true}, "visible": {}, "ranges": {}}"#)
        .await;
    let choice = find_by_name(&tree, "LOG_LEVEL").unwrap();
    assert_eq!(choice.value, NodeValue::Str("LOG_LEVEL_INFO".into()));
    assert_eq!(
        find_by_name(&tree, "LOG_LEVEL_ERROR").unwrap().value,
        NodeValue::Bool(false)
    );
}

#[tokio::test]
async fn invalid_edits_are_rejected() {
    let mut stub = Stub::attach(choice_tree());
    stub.ready(FIRST).await;

    assert!(matches!(
        stub.session.set_value_by_name("NOPE", "y"),
        Err(SessionError::UnknownOption(name)) if name == "NOPE"
    ));
    assert!(matches!(
        stub.session.set_value_by_name("STACK", "lots"),
        Err(SessionError::InvalidValue(_))
    ));
    assert_eq!(stub.session.dirty_state(), DirtyState::Saved);
}

#[tokio::test]
async fn backend_errors_leave_the_tree_alone() {
    let mut stub = Stub::attach(foo_tree());
    let before = stub.ready(FIRST).await;

    stub.emit(r#"{"values": {"FOO": true}, "visible": {}, "ranges": {}, "error": ["The following config symbol(s) were not found: BAR"]}"#)
        .await;
    assert!(stub.next_error().await.contains("BAR"));
    assert_eq!(stub.session.tree(), before);

    stub.emit(r#"{"values": oops}"#).await;
    assert!(stub.next_error().await.contains("malformed"));

    // Still usable.
    stub.emit(r#"{"values": {"FOO": true}, "visible": {}, "ranges": {}}"#)
        .await;
    assert_eq!(stub.next_tree().await[0].value, NodeValue::Bool(true));
}

#[tokio::test]
async fn empty_snapshots_are_silent() {
    let mut stub = Stub::attach(foo_tree());
    stub.ready(FIRST).await;

    stub.emit(r#"{"values": {}, "visible": {"FOO": true}, "ranges": {}}"#)
        .await;
    stub.emit(r#"{"values": {"FOO": true}, "visible": {}, "ranges": {}}"#)
        .await;
    let tree = stub.next_tree().await;
    assert_eq!(tree[0].value, NodeValue::Bool(true));
    assert!(!tree[0].visible);
}

#[tokio::test]
async fn stderr_is_classified() {
    let mut stub = Stub::attach(foo_tree());
    stub.stderr
        .write_all(b"Server running, waiting for requests on stdin..\nWARNING: deprecated option\nTraceback: boom\n")
        .await
        .unwrap();
    assert_eq!(stub.next_error().await, "backend: Traceback: boom");
    assert!(stub.events.try_recv().is_err());
}

#[tokio::test]
async fn eof_before_first_snapshot() {
    let stub = Stub::attach(foo_tree());
    let Stub {
        session, stdout, ..
    } = stub;
    drop(stdout);

    let err = timeout(WAIT, session.wait_ready()).await.unwrap();
    assert!(matches!(err, Err(SessionError::NotReady(_))));
    timeout(WAIT, session.closed()).await.unwrap();
    assert!(!session.is_alive());
    assert!(matches!(session.save(), Err(SessionError::Closed)));
}

#[tokio::test]
async fn structure_is_read_with_the_first_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let menus = dir.path().join("kconfig_menus.json");
    let mut stub = Stub::attach(StructureSource::File(menus.clone()));

    std::fs::write(
        &menus,
        r#"[{"id": "FOO", "name": "FOO", "type": "bool", "title": "Enable foo", "help": "Foo.", "children": []}]"#,
    )
    .unwrap();

    let tree = stub.ready(FIRST).await;
    assert_eq!(tree[0].title, "Enable foo");
    assert_eq!(tree[0].value, NodeValue::Bool(false));
}

#[tokio::test]
async fn missing_structure_fails_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let mut stub = Stub::attach(StructureSource::File(dir.path().join("missing.json")));

    stub.emit(FIRST).await;
    let err = timeout(WAIT, stub.session.wait_ready()).await.unwrap();
    assert!(matches!(err, Err(SessionError::NotReady(_))));
    assert!(stub.next_error().await.contains("missing.json"));
}

#[tokio::test]
async fn dispose_drains_then_closes_stdin() {
    let mut stub = Stub::attach(foo_tree());
    stub.ready(FIRST).await;

    stub.session.set_value_by_name("FOO", "y").unwrap();
    stub.session.dispose();
    assert!(!stub.session.is_alive());
    assert!(matches!(stub.session.save(), Err(SessionError::Closed)));

    assert_eq!(
        stub.next_line().await,
        "{\"version\": 2, \"set\": {\"FOO\": true}}\n"
    );
    let mut rest = String::new();
    timeout(WAIT, stub.stdin.read_to_string(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn dropping_the_last_handle_closes_stdin() {
    let stub = Stub::attach(foo_tree());
    let Stub {
        session, mut stdin, ..
    } = stub;
    let clone = session.clone();
    drop(session);
    assert!(clone.is_alive());
    drop(clone);

    let mut rest = Vec::new();
    timeout(WAIT, stdin.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn spawn_failure_is_reported() {
    let (tx, mut events) = unbounded_channel();
    let backend = ProcessSpec::new("/nonexistent/menuconf-backend", std::env::temp_dir());
    let err = Session::spawn(
        &backend,
        SessionOptions {
            config_file: PathBuf::from("sdkconfig"),
            structure: foo_tree(),
        },
        Arc::new(tx),
    )
    .unwrap_err();
    assert!(matches!(err, SessionError::Spawn { .. }));
    assert!(matches!(
        events.try_recv(),
        Ok(SessionEvent::ProtocolError(message)) if message.contains("menuconf-backend")
    ));
}

#[tokio::test]
async fn unchanged_edit_settles_without_update() {
    let mut stub = Stub::attach(foo_tree());
    stub.ready(r#"{"values": {"FOO": true}, "visible": {}, "ranges": {}}"#)
        .await;

    stub.session.set_value_by_name("FOO", "y").unwrap();
    stub.next_line().await;
    stub.emit(r#"{"version": 2, "values": {}, "visible": {}, "ranges": {}}"#)
        .await;

    let settled = next_tree(&mut stub.events, Duration::from_millis(300), |_| {}).await;
    assert!(matches!(settled, Ok(None)));
    assert_eq!(stub.session.tree()[0].value, NodeValue::Bool(true));
}

#[tokio::test]
async fn settle_passes_errors_then_returns_the_update() {
    let mut stub = Stub::attach(foo_tree());
    stub.ready(FIRST).await;

    stub.emit(r#"{"values": {}, "error": ["bad symbol"]}"#).await;
    let mut errors = Vec::new();
    let stdout = &mut stub.stdout;
    let pending = next_tree(&mut stub.events, WAIT, |message| errors.push(message));
    let emit = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stdout
            .write_all(br#"{"values": {"FOO": true}, "visible": {}, "ranges": {}}"#)
            .await
            .unwrap();
    };
    let (tree, ()) = tokio::join!(pending, emit);
    let tree = tree.unwrap().expect("tree update");
    assert_eq!(tree[0].value, NodeValue::Bool(true));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("bad symbol"));
}

#[cfg(unix)]
mod process {
    use super::*;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh", std::env::temp_dir()).args(["-c", script])
    }

    fn spawn(script: &str) -> (Session, UnboundedReceiver<SessionEvent>) {
        let (tx, events) = unbounded_channel();
        let session = Session::spawn(
            &sh(script),
            SessionOptions {
                config_file: std::env::temp_dir().join("sdkconfig"),
                structure: foo_tree(),
            },
            Arc::new(tx),
        )
        .unwrap();
        (session, events)
    }

    #[tokio::test]
    async fn real_process_round_trip() {
        let (session, mut events) = spawn(
            r#"printf '%s\n' '{"values": {"FOO": true}, "visible": {"FOO": true}, "ranges": {}}'; echo 'Server running, waiting for requests on stdin..' >&2; exec cat > /dev/null"#,
        );
        assert_ok!(timeout(WAIT, session.wait_ready()).await.unwrap());
        assert!(matches!(
            events.recv().await,
            Some(SessionEvent::TreeUpdated(tree)) if tree[0].value == NodeValue::Bool(true)
        ));

        session.set_value_by_name("FOO", "n").unwrap();
        session.dispose();
        timeout(WAIT, session.closed()).await.unwrap();
        assert!(!session.is_alive());
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SessionEvent::ProtocolError(_)),
                "unexpected {event:?}"
            );
        }
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let (session, mut events) = spawn("exit 3");
        assert_err!(timeout(WAIT, session.wait_ready()).await.unwrap());
        timeout(WAIT, session.closed()).await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(SessionEvent::ProtocolError(
                "backend exited with code 3".to_string()
            ))
        );
    }
}
