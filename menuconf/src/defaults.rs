use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::{error::SessionError, session::Session, utils::ProcessSpec};

/// One step of the set-defaults flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Percentage points to add.
    pub increment: u8,
    pub message: &'static str,
}

impl Session {
    /// Regenerate the configuration from Kconfig defaults.
    ///
    /// Deletes the configuration file, runs `reconfigure` to completion and
    /// then asks the backend to load the regenerated file. The session counts
    /// as saved from the first step on.
    ///
    /// Dropping the returned future kills the reconfigure command.
    pub async fn set_defaults<F>(
        &self,
        reconfigure: &ProcessSpec,
        mut progress: F,
    ) -> Result<(), SessionError>
    where
        F: FnMut(Progress),
    {
        progress(Progress {
            increment: 10,
            message: "Deleting current values...",
        });
        self.dirty().on_set_defaults();

        let config_file = self.config_file().to_path_buf();
        match tokio::fs::remove_file(&config_file).await {
            Ok(()) => info!("removed {}", config_file.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SessionError::Io {
                    path: config_file,
                    source,
                });
            }
        }

        info!("running {}", reconfigure.command_line());
        let mut child = reconfigure
            .command()
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SessionError::ReconfigureSpawn {
                program: reconfigure.program.clone(),
                source,
            })?;
        progress(Progress {
            increment: 10,
            message: "Loading default values...",
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, _, _) = tokio::join!(
            child.wait(),
            forward_output(stdout, "reconfigure"),
            forward_output(stderr, "reconfigure")
        );
        let status = status.map_err(|source| SessionError::Stream {
            stream: "reconfigure",
            source,
        })?;
        if !status.success() {
            return Err(SessionError::Reconfigure {
                code: status.code(),
            });
        }

        self.load(false)?;
        progress(Progress {
            increment: 70,
            message: "Loaded default values",
        });
        Ok(())
    }
}

async fn forward_output<R: AsyncRead + Unpin>(stream: Option<R>, name: &str) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            info!("{name}: {line}");
        }
    }
}
