//! Editor configuration.
//!
//! Describes how to launch the confserver backend and the reconfigure
//! command, and where the persisted configuration and the structure
//! description live. Stored in `.menuconfig.toml` in the workspace.
//!
//! # Configuration File Format
//!
//! ```toml
//! config_file = "${workspaceFolder}/sdkconfig"
//! menus_file = "${workspaceFolder}/build/config/kconfig_menus.json"
//!
//! [backend]
//! program = "python"
//! args = ["${env:IDF_PATH}/tools/idf.py", "-C", "${workspaceFolder}", "confserver"]
//!
//! [reconfigure]
//! program = "python"
//! args = ["${env:IDF_PATH}/tools/idf.py", "-C", "${workspaceFolder}", "reconfigure"]
//! ```
//!
//! Every string accepts `${workspaceFolder}` and `${env:VAR_NAME}`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    session::{SessionOptions, StructureSource},
    utils::{ProcessSpec, replace_placeholders},
};

/// Default configuration file name, relative to the workspace.
pub const CONFIG_FILE_NAME: &str = ".menuconfig.toml";

/// Root of `.menuconfig.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MenuconfigConfig {
    /// The confserver backend.
    pub backend: ProcessConfig,
    /// Command that regenerates the configuration from Kconfig defaults.
    pub reconfigure: Option<ProcessConfig>,
    /// Persisted configuration targeted by save and load.
    pub config_file: String,
    /// Structure description the backend generates on startup.
    pub menus_file: String,
}

/// An external program invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProcessConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ProcessConfig {
    fn idf(action: &str) -> Self {
        Self {
            program: "idf.py".to_string(),
            args: vec![
                "-B".to_string(),
                "${workspaceFolder}/build".to_string(),
                "-DSDKCONFIG=${workspaceFolder}/sdkconfig".to_string(),
                "-C".to_string(),
                "${workspaceFolder}".to_string(),
                action.to_string(),
            ],
            env: BTreeMap::new(),
        }
    }

    fn resolve(&self, workspace: &Path) -> ProcessSpec {
        let expand = |s: &str| replace_placeholders(s, workspace);
        let mut spec = ProcessSpec::new(expand(&self.program), workspace)
            .args(self.args.iter().map(|arg| expand(arg)));
        for (key, value) in &self.env {
            spec = spec.env(key, expand(value));
        }
        spec
    }
}

impl Default for MenuconfigConfig {
    /// ESP-IDF project layout.
    fn default() -> Self {
        Self {
            backend: ProcessConfig::idf("confserver"),
            reconfigure: Some(ProcessConfig::idf("reconfigure")),
            config_file: "${workspaceFolder}/sdkconfig".to_string(),
            menus_file: "${workspaceFolder}/build/config/kconfig_menus.json".to_string(),
        }
    }
}

impl MenuconfigConfig {
    /// Read a configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("{} not found, using ESP-IDF defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Expand placeholders against `workspace`.
    pub fn resolve(&self, workspace: &Path) -> anyhow::Result<ResolvedConfig> {
        if self.backend.program.trim().is_empty() {
            bail!("backend.program must not be empty");
        }
        let path = |s: &str| {
            let path = PathBuf::from(replace_placeholders(s, workspace));
            if path.is_relative() {
                workspace.join(path)
            } else {
                path
            }
        };

        Ok(ResolvedConfig {
            workspace: workspace.to_path_buf(),
            backend: self
                .backend
                .resolve(workspace)
                .env("PYTHONUNBUFFERED", "1"),
            reconfigure: self.reconfigure.as_ref().map(|r| r.resolve(workspace)),
            config_file: path(&self.config_file),
            menus_file: path(&self.menus_file),
        })
    }
}

/// Configuration with every placeholder expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub workspace: PathBuf,
    pub backend: ProcessSpec,
    pub reconfigure: Option<ProcessSpec>,
    pub config_file: PathBuf,
    pub menus_file: PathBuf,
}

impl ResolvedConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            config_file: self.config_file.clone(),
            structure: StructureSource::File(self.menus_file.clone()),
        }
    }
}

/// JSON schema of `.menuconfig.toml`.
pub fn schema_json() -> anyhow::Result<String> {
    let schema = schemars::schema_for!(MenuconfigConfig);
    Ok(serde_json::to_string_pretty(&schema)?)
}
