//! Common utilities and helper functions.
//!
//! Process launch descriptions and `${...}` placeholder expansion.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
};

use colored::Colorize;

/// Everything needed to launch an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Working directory, also exported as `WORKSPACE_FOLDER`.
    pub workdir: PathBuf,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            workdir: workdir.into(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build a tokio command with all streams piped.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.workdir)
            .env("WORKSPACE_FOLDER", self.workdir.display().to_string())
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// The command line as typed in a shell.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Prints the command to stdout with colored formatting.
    pub fn print_cmd(&self) {
        println!("{}", self.command_line().purple().bold());
    }
}

/// Expands `${workspaceFolder}` and `${env:VAR_NAME}` placeholders.
///
/// Unset environment variables expand to an empty string. Unknown or
/// unterminated placeholders are kept verbatim.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use menuconf::utils::replace_placeholders;
///
/// let out = replace_placeholders("${workspaceFolder}/sdkconfig", Path::new("/work"));
/// assert_eq!(out, "/work/sdkconfig");
/// ```
pub fn replace_placeholders(input: &str, workspace: &Path) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let placeholder = &after[..end];
        if placeholder == "workspaceFolder" {
            result.push_str(&workspace.display().to_string());
        } else if let Some(name) = placeholder.strip_prefix("env:") {
            match std::env::var(name) {
                Ok(value) => {
                    debug!("using {name}={value}");
                    result.push_str(&value);
                }
                Err(_) => debug!("{name} is not set"),
            }
        } else {
            result.push_str("${");
            result.push_str(placeholder);
            result.push('}');
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    result
}
