use std::{io, sync::Weak};

use confserver::{Framer, Request};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    process::Child,
    sync::mpsc::UnboundedReceiver,
};

use super::Shared;
use crate::error::SessionError;

/// Stderr lines the backend prints during normal operation.
const INFORMATIONAL: &[&str] = &[
    "Server running, waiting for requests on stdin..",
    "Saving config to",
    "Loading config from",
    "The following config symbol(s) were not visible so were not updated",
    "WARNING:",
];

/// Whether a backend stderr line is routine output rather than an error.
pub fn is_informational(line: &str) -> bool {
    INFORMATIONAL.iter().any(|known| line.contains(known))
}

pub(super) async fn write_commands<W>(
    mut stdin: W,
    mut commands: UnboundedReceiver<Request>,
    weak: Weak<Shared>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(request) = commands.recv().await {
        if let Err(source) = write_line(&mut stdin, &request.to_line()).await {
            if let Some(shared) = weak.upgrade() {
                shared.report(&SessionError::Stream {
                    stream: "stdin",
                    source,
                });
            }
            return;
        }
    }
    if let Err(e) = stdin.shutdown().await {
        debug!("closing backend stdin: {e}");
    }
    debug!("backend stdin closed");
}

async fn write_line<W: AsyncWrite + Unpin>(stdin: &mut W, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

pub(super) async fn read_snapshots<R>(mut stdout: R, weak: Weak<Shared>, close_on_eof: bool)
where
    R: AsyncRead + Unpin,
{
    let mut framer = Framer::new();
    let mut buf = vec![0u8; 8 * 1024];

    loop {
        let read = stdout.read(&mut buf).await;
        let Some(shared) = weak.upgrade() else {
            break;
        };
        match read {
            Ok(0) => {
                debug!("backend stdout closed");
                shared.fail("backend output ended before the first snapshot");
                if close_on_eof {
                    shared.mark_closed();
                }
                break;
            }
            Ok(n) => {
                let chunk = &buf[..n];
                debug!("confserver -> {}", String::from_utf8_lossy(chunk).trim_end());
                match framer.feed(chunk) {
                    Some(Ok(envelope)) => shared.apply(&envelope),
                    Some(Err(e)) => shared.report(&e.into()),
                    None => {}
                }
            }
            Err(source) => {
                shared.fail(source.to_string());
                shared.report(&SessionError::Stream {
                    stream: "stdout",
                    source,
                });
                if close_on_eof {
                    shared.mark_closed();
                }
                break;
            }
        }
    }
}

pub(super) async fn read_stderr<E>(stderr: E, weak: Weak<Shared>)
where
    E: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if is_informational(line) {
                    info!("{line}");
                    continue;
                }
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.report(&SessionError::Stderr(line.to_string()));
            }
            Ok(None) => break,
            Err(source) => {
                if let Some(shared) = weak.upgrade() {
                    shared.report(&SessionError::Stream {
                        stream: "stderr",
                        source,
                    });
                }
                break;
            }
        }
    }
}

pub(super) async fn watch_exit(mut child: Child, weak: Weak<Shared>) {
    let status = child.wait().await;
    let Some(shared) = weak.upgrade() else {
        debug!("backend exited after its session was dropped: {status:?}");
        return;
    };
    match status {
        Ok(status) => {
            info!("backend exited: {status}");
            if !status.success() && !shared.disposed.load(std::sync::atomic::Ordering::Acquire) {
                shared.report(&SessionError::BackendExited {
                    code: status.code(),
                });
            }
        }
        Err(source) => shared.report(&SessionError::Stream {
            stream: "process",
            source,
        }),
    }
    shared.mark_closed();
}
